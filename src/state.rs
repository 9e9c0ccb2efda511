use crate::config::AppConfig;
use crate::db;
use crate::users::{memory::InMemoryUserStore, repo::UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(db::connect(&config.mongodb_uri).await?) as Arc<dyn UserStore>;
        Ok(Self { store })
    }

    pub fn from_parts(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// State backed by an empty in-memory store.
    pub fn fake() -> Self {
        Self::from_parts(Arc::new(InMemoryUserStore::new()))
    }
}
