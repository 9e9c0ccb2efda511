use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::{
    dto::UserInput,
    repo::{StoreError, UserStore},
    repo_types::User,
};

/// Process-local `UserStore` keyed by email. Used by the test suite and
/// for running the router without a database.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert_by_email(&self, input: &UserInput) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .entry(input.email.clone())
            .and_modify(|u| u.name = input.name.clone())
            .or_insert_with(|| User {
                id: ObjectId::new().to_hex(),
                name: input.name.clone(),
                email: input.email.clone(),
                created_at: OffsetDateTime::now_utc(),
            });
        Ok(user.clone())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(all)
    }
}
