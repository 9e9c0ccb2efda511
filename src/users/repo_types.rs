use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// User document as stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,        // unique index
    #[serde(rename = "createdAt")]
    pub created_at: DateTime, // set on insert only
}

/// Storage-agnostic user record handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        let nanos = i128::from(doc.created_at.timestamp_millis()) * 1_000_000;
        Self {
            id: doc.id.to_hex(),
            name: doc.name,
            email: doc.email,
            created_at: OffsetDateTime::from_unix_timestamp_nanos(nanos)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
        }
    }
}
