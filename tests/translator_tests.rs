//! Outbound calls against a local stand-in for the messages API
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing, Json, Router,
};
use serde_json::{json, Value};
use url::Url;

use translation_proxy::error::ProxyError;
use translation_proxy::settings::{TranslatorSettings, ANTHROPIC_VERSION};
use translation_proxy::translator::{AnthropicTranslator, Translator};

const API_KEY: &str = "sk-test-key";

async fn messages_ok(headers: HeaderMap, Json(request): Json<Value>) -> impl IntoResponse {
    let authorized = headers.get("x-api-key").map(|v| v == API_KEY) == Some(true)
        && headers.get("anthropic-version").map(|v| v == ANTHROPIC_VERSION) == Some(true);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad headers"})));
    }
    let prompt = request["messages"][0]["content"].as_str().unwrap_or_default();
    if request["max_tokens"] != 8000 || !prompt.contains("English text:\nHello world") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "content": [
                {"type": "text", "text": "  Hei maailma \n"},
                {"type": "text", "text": "ignored"}
            ]
        })),
    )
}

async fn messages_limited() -> impl IntoResponse {
    (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error")
}

async fn messages_broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "overloaded")
}

async fn messages_empty() -> Json<Value> {
    Json(json!({"content": []}))
}

async fn messages_garbage() -> &'static str {
    "this is not json"
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/ok", routing::post(messages_ok))
        .route("/limited", routing::post(messages_limited))
        .route("/broken", routing::post(messages_broken))
        .route("/empty", routing::post(messages_empty))
        .route("/garbage", routing::post(messages_garbage));
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

fn translator(addr: SocketAddr, path: &str) -> AnthropicTranslator {
    AnthropicTranslator::new(TranslatorSettings {
        api_url: Url::parse(&format!("http://{}{}", addr, path)).unwrap(),
        api_key: Some(API_KEY.to_string()),
        model: "test-model".to_string(),
        max_tokens: 8000,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_success_returns_trimmed_first_text_block() {
    let addr = spawn_upstream().await;
    let translated = translator(addr, "/ok")
        .translate("Hello world")
        .await
        .unwrap();
    assert_eq!(translated, "Hei maailma");
}

#[tokio::test]
async fn test_429_is_reported_as_rate_limited() {
    let addr = spawn_upstream().await;
    let err = translator(addr, "/limited")
        .translate("Hello world")
        .await
        .unwrap_err();
    assert!(err.is_upstream_rate_limited());
    match err {
        ProxyError::Upstream { status, message } => {
            assert_eq!(status, Some(429));
            assert_eq!(message, "rate_limit_error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let addr = spawn_upstream().await;
    let err = translator(addr, "/broken")
        .translate("Hello world")
        .await
        .unwrap_err();
    assert_eq!(err.upstream_status(), Some(500));
    assert!(!err.is_upstream_rate_limited());
}

#[tokio::test]
async fn test_empty_content_is_operation_failure() {
    let addr = spawn_upstream().await;
    let err = translator(addr, "/empty")
        .translate("Hello world")
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Operation(_)));
}

#[tokio::test]
async fn test_undecodable_body_is_serialization_failure() {
    let addr = spawn_upstream().await;
    let err = translator(addr, "/garbage")
        .translate("Hello world")
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Serialization(_)));
}

#[tokio::test]
async fn test_unreachable_upstream_has_no_status() {
    // bind then drop, so nothing is listening on the port
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = translator(addr, "/ok")
        .translate("Hello world")
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Upstream { status: None, .. }));
}
