#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;

use user_registry::{
    build_app,
    security::rate_limit::RateLimiter,
    users::{
        dto::UserInput,
        memory::InMemoryUserStore,
        repo::{StoreError, UserStore},
        repo_types::User,
    },
    AppState,
};

pub const CLIENT_IP: [u8; 4] = [203, 0, 113, 7];

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryUserStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limiter(RateLimiter::default())
    }

    pub fn with_limiter(limiter: RateLimiter) -> Self {
        let store = InMemoryUserStore::new();
        let router = app_with_store(Arc::new(store.clone()), limiter);
        Self { router, store }
    }

    /// Send a request through the app from the default client address.
    pub async fn request(&self, req: Request<Body>) -> Response {
        self.request_from(req, CLIENT_IP).await
    }

    pub async fn request_from(&self, mut req: Request<Body>, ip: [u8; 4]) -> Response {
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.request(req).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        let req = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(req).await
    }

    /// Insert a user straight into the store, bypassing HTTP and the rate limiter.
    pub async fn seed(&self, name: &str, email: &str) -> User {
        self.store
            .upsert_by_email(&UserInput {
                name: name.into(),
                email: email.into(),
            })
            .await
            .expect("seed user")
    }

    /// Seed users with distinct creation times, oldest first.
    pub async fn seed_spaced(&self, count: usize) {
        for i in 0..count {
            self.seed("User", &format!("user{i}@example.com")).await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

pub fn app_with_store(store: Arc<dyn UserStore>, limiter: RateLimiter) -> Router {
    let state = AppState::from_parts(store);
    build_app(state, Arc::new(limiter))
}

/// Store whose every call fails.
pub struct BrokenStore {
    pub duplicate: bool,
}

#[async_trait]
impl UserStore for BrokenStore {
    async fn upsert_by_email(&self, _input: &UserInput) -> Result<User, StoreError> {
        if self.duplicate {
            Err(StoreError::Duplicate)
        } else {
            Err(anyhow::anyhow!("connection refused").into())
        }
    }

    async fn list_recent(&self, _limit: i64) -> Result<Vec<User>, StoreError> {
        Err(anyhow::anyhow!("connection refused").into())
    }
}

/// Send one request to a throwaway router over a broken store.
pub async fn request_broken(duplicate: bool, req: Request<Body>) -> Response {
    let router = app_with_store(Arc::new(BrokenStore { duplicate }), RateLimiter::default());
    let mut req = req;
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((CLIENT_IP, 40_000))));
    tower::ServiceExt::oneshot(router, req).await.unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_str(&body_string(resp).await).expect("response body is JSON")
}
