use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use tracing::debug;

use crate::users::{
    dto::UserInput,
    repo_types::{User, UserDocument},
};

pub const USERS_COLLECTION: &str = "users";

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already exists")]
    Duplicate,
    #[error("upsert returned no document")]
    NotReturned,
    #[error(transparent)]
    Mongo(mongodb::error::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        if is_duplicate_key(&e) {
            StoreError::Duplicate
        } else {
            StoreError::Mongo(e)
        }
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Command(c) => c.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(w)) => w.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Persistence for user records.
///
/// `upsert_by_email` inserts when no record has the email and otherwise
/// overwrites only `name`. Implementations must keep `email` unique; a
/// concurrent insert that loses the race reports `StoreError::Duplicate`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_by_email(&self, input: &UserInput) -> Result<User, StoreError>;
    /// Most recently created first, at most `limit` records.
    async fn list_recent(&self, limit: i64) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct MongoUserStore {
    users: Collection<UserDocument>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection(USERS_COLLECTION),
        }
    }

    /// Creates the unique `email` index if it does not exist yet.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn upsert_by_email(&self, input: &UserInput) -> Result<User, StoreError> {
        let doc = self
            .users
            .find_one_and_update(
                doc! { "email": input.email.as_str() },
                doc! {
                    "$set": { "name": input.name.as_str() },
                    "$setOnInsert": { "createdAt": DateTime::now() },
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(StoreError::NotReturned)?;
        debug!(user_id = %doc.id, "user upserted");
        Ok(doc.into())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let docs: Vec<UserDocument> = self
            .users
            .find(doc! {})
            .projection(doc! { "name": 1, "email": 1, "createdAt": 1 })
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(User::from).collect())
    }
}
