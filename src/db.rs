use anyhow::Context;
use mongodb::{bson::doc, Client};

use crate::users::repo::MongoUserStore;

/// Database used when the connection string does not name one.
pub const FALLBACK_DATABASE: &str = "test";

/// Opens the MongoDB client, checks that the server answers and makes sure
/// the unique email index exists. Call once at startup and share the
/// returned handle; it is cheap to clone.
pub async fn connect(uri: &str) -> anyhow::Result<MongoUserStore> {
    let client = Client::with_uri_str(uri)
        .await
        .context("parse MONGODB_URI")?;
    let db = client
        .default_database()
        .unwrap_or_else(|| client.database(FALLBACK_DATABASE));

    db.run_command(doc! { "ping": 1 })
        .await
        .context("connect to MongoDB")?;

    let store = MongoUserStore::new(&db);
    store
        .ensure_indexes()
        .await
        .context("create users.email index")?;

    tracing::info!(database = %db.name(), "MongoDB connected");
    Ok(store)
}
