use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::ApiError;
use crate::AppState;

const WINDOW: Duration = Duration::from_secs(60);
const EVICTION_THRESHOLD: usize = 10_000;

/// Paths that mint credentials and get the tighter limit.
pub const TOKEN_PATHS: [&str; 2] = ["/api/token", "/token"];

/// Which bucket a request is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Token,
    Default,
}

impl Bucket {
    pub fn for_path(path: &str) -> Self {
        if TOKEN_PATHS.contains(&path) {
            Bucket::Token
        } else {
            Bucket::Default
        }
    }
}

/// Fixed-window counter per client IP and bucket.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    state: Arc<Mutex<HashMap<(IpAddr, Bucket), (u32, Instant)>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request and returns `false` once `limit` is exceeded
    /// within the current window.
    pub fn check(&self, ip: IpAddr, bucket: Bucket, limit: u32) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        // Only expired windows are evicted so active limits survive cleanup.
        if state.len() > EVICTION_THRESHOLD {
            state.retain(|_, (_, start)| now.duration_since(*start) <= WINDOW);
        }

        let (count, start) = state.entry((ip, bucket)).or_insert((0, now));

        if now.duration_since(*start) > WINDOW {
            *count = 1;
            *start = now;
            true
        } else {
            *count = count.saturating_add(1);
            *count <= limit
        }
    }
}

/// Rejects clients that exceed their per-minute allowance with `429`.
pub async fn rate_limit_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    // Missing ConnectInfo means the server was not started with
    // `into_make_service_with_connect_info`.
    let ip = match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip(),
        None => {
            tracing::error!("request has no peer address, cannot rate limit");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let bucket = Bucket::for_path(req.uri().path());
    let limit = match bucket {
        Bucket::Token => state.rate_limits.token_per_minute,
        Bucket::Default => state.rate_limits.default_per_minute,
    };

    if !state.rate_limiter.check(ip, bucket, limit) {
        tracing::warn!(%ip, ?bucket, limit, "rate limit exceeded");
        return Ok(ApiError::TooManyRequests.into_response());
    }

    Ok(next.run(req).await)
}
