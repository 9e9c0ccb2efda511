//! Per-client sliding-window rate limiting.
//!
//! Each client IP keeps a log of the instants its accepted requests arrived.
//! A request is admitted while fewer than `max_requests` entries fall inside
//! the trailing window. Rejected requests are not logged, so a client that
//! keeps hammering is released as soon as its oldest admitted request ages out.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::task::JoinHandle;

pub const DEFAULT_MAX_REQUESTS: u32 = 60;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Time until the oldest logged request leaves the window.
    pub reset: Duration,
}

pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let log = windows.entry(key.to_string()).or_default();

        while log
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            log.pop_front();
        }

        let allowed = (log.len() as u32) < self.max_requests;
        if allowed {
            log.push_back(now);
        }

        let reset = log
            .front()
            .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or(self.window);

        RateDecision {
            allowed,
            remaining: self.max_requests.saturating_sub(log.len() as u32),
            reset,
        }
    }

    /// Drops clients whose whole log has aged out.
    pub fn sweep_at(&self, now: Instant) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, log| {
            log.back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Sweeps idle clients once per window for as long as the limiter lives.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        let period = self.window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep_at(Instant::now());
            }
        })
    }

    fn write_headers(&self, headers: &mut HeaderMap, decision: &RateDecision) {
        let reset_secs = decision.reset.as_secs_f64().ceil() as u64;
        let policy = format!("{};w={}", self.max_requests, self.window.as_secs());
        let pairs = [
            ("ratelimit-policy", policy),
            ("ratelimit-limit", self.max_requests.to_string()),
            ("ratelimit-remaining", decision.remaining.to_string()),
            ("ratelimit-reset", reset_secs.to_string()),
        ];
        for (name, value) in pairs {
            if let Ok(v) = HeaderValue::from_str(&value) {
                headers.insert(name, v);
            }
        }
        if !decision.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_secs));
        }
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the limiter on every request.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "rate limit exceeded");
        (StatusCode::TOO_MANY_REQUESTS, LIMITED_MESSAGE).into_response()
    };
    limiter.write_headers(response.headers_mut(), &decision);
    response
}
