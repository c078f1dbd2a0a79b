//! Router and request helpers shared by the server tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use folio_server::{app, config::RateLimitConfig, AppState};
use folio_voice::{LiveKitConfig, TokenService};
use serde_json::Value;
use std::net::SocketAddr;
use tower::ServiceExt; // for oneshot

pub const LIVEKIT_URL: &str = "wss://folio-test.livekit.cloud";
pub const API_KEY: &str = "devkey";
pub const API_SECRET: &str = "secret";

pub fn configured_state() -> AppState {
    AppState::new(
        TokenService::new(LiveKitConfig::new(LIVEKIT_URL, API_KEY, API_SECRET)),
        RateLimitConfig::default(),
    )
}

pub fn unconfigured_state() -> AppState {
    AppState::new(
        TokenService::new(LiveKitConfig::default()),
        RateLimitConfig::default(),
    )
}

pub fn get(uri: &str) -> Request<Body> {
    get_from(uri, "127.0.0.1:40000")
}

pub fn get_from(uri: &str, peer: &str) -> Request<Body> {
    let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn router(state: AppState) -> Router {
    app(state)
}
