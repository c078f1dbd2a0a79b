//! Folio server library logic.

pub mod api;
pub mod config;
pub mod middleware;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Json, Router};
use config::RateLimitConfig;
use folio_voice::TokenService;
use middleware::RateLimiter;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Token requests carry no body; this only bounds what anyone can push at us.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Signs room credentials.
    pub token_service: Arc<TokenService>,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Per-minute allowances.
    pub rate_limits: RateLimitConfig,
    /// Pre-built site served for any unmatched path.
    pub site_dir: Option<String>,
}

impl AppState {
    pub fn new(token_service: TokenService, rate_limits: RateLimitConfig) -> Self {
        Self {
            token_service: Arc::new(token_service),
            rate_limiter: RateLimiter::new(),
            rate_limits,
            site_dir: None,
        }
    }

    pub fn with_site_dir(mut self, dir: impl Into<String>) -> Self {
        self.site_dir = Some(dir.into());
        self
    }
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes and layers.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/token", get(api::token_handler))
        .route("/token", get(api::token_handler));

    let router = match state.site_dir.as_deref() {
        Some(dir) if Path::new(dir).join("index.html").exists() => {
            tracing::info!(path = %dir, "serving site static files");
            let index = Path::new(dir).join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        Some(dir) => {
            tracing::warn!(path = %dir, "site directory has no index.html, skipping static file serving");
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
