use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use folio_voice::{CredentialSource, HttpCredentialSource, VoiceError};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn echo_token(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let name = params.get("name").cloned().unwrap_or_else(|| "guest".to_string());
    Json(json!({ "token": format!("jwt-for-{}", name), "wsUrl": "wss://lk.example.com" }))
}

#[test]
fn test_token_url_is_normalized() {
    let source = HttpCredentialSource::new("https://folio.example.com/");
    assert_eq!(source.token_url(), "https://folio.example.com/api/token");
}

#[tokio::test]
async fn test_fetch_credential() {
    let base = serve(Router::new().route("/api/token", get(echo_token))).await;
    let source = HttpCredentialSource::new(&base);

    let credential = source.fetch(Some("alice")).await.expect("fetch should succeed");
    assert_eq!(credential.token, "jwt-for-alice");
    assert_eq!(credential.ws_url, "wss://lk.example.com");

    let guest = source.fetch(None).await.expect("fetch should succeed");
    assert_eq!(guest.token, "jwt-for-guest");
}

#[tokio::test]
async fn test_error_body_is_a_failure() {
    let router = Router::new().route(
        "/api/token",
        get(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Server misconfigured" })),
            )
        }),
    );
    let source = HttpCredentialSource::new(&serve(router).await);

    match source.fetch(None).await {
        Err(VoiceError::CredentialRequest(message)) => {
            assert!(message.contains("Server misconfigured"), "got: {}", message);
        }
        other => panic!("expected credential failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_field_wins_even_with_ok_status() {
    let router = Router::new().route(
        "/api/token",
        get(|| async { Json(json!({ "error": "rate limited" })) }),
    );
    let source = HttpCredentialSource::new(&serve(router).await);

    assert!(matches!(
        source.fetch(None).await,
        Err(VoiceError::CredentialRequest(_))
    ));
}

#[tokio::test]
async fn test_non_json_response_is_a_failure() {
    let router = Router::new().route(
        "/api/token",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let source = HttpCredentialSource::new(&serve(router).await);

    assert!(matches!(
        source.fetch(None).await,
        Err(VoiceError::CredentialRequest(_))
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_a_failure() {
    // Bind and drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpCredentialSource::new(&format!("http://{}", addr));
    assert!(matches!(
        source.fetch(None).await,
        Err(VoiceError::CredentialRequest(_))
    ));
}
