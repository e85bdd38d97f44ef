//! HTTP transport tests, driven through the router without binding a socket.
#![cfg(feature = "http")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use toolhost_mcp::config::ServerConfig;
use toolhost_mcp::server::ServerContext;
use toolhost_mcp::transport::HttpTransport;

fn transport(token: Option<&str>) -> HttpTransport {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.files.base_path = dir.into_path().join("data");
    let context = ServerContext::from_config(config).unwrap();
    HttpTransport::new(context.new_dispatcher(), token.map(str::to_string))
}

fn post(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn initialize() -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": { "name": "http-test", "version": "1.0" }
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_health_skips_auth() {
    let transport = transport(Some("secret"));
    let response = transport
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session"], "uninitialized");
    assert_eq!(body["in_flight"], 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let transport = transport(Some("secret"));
    let response = transport
        .router()
        .oneshot(post(&initialize(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], -32900);

    let response = transport
        .router()
        .oneshot(post(&initialize(), Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_over_http() {
    let transport = transport(Some("secret"));

    let response = transport
        .router()
        .oneshot(post(&initialize(), Some("secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["result"]["protocolVersion"],
        "2025-06-18"
    );

    let notification = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = transport
        .router()
        .oneshot(post(&notification.to_string(), Some("secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let echo = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "echo", "arguments": { "text": "over http" } }
    });
    let response = transport
        .router()
        .oneshot(post(&echo.to_string(), Some("secret")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["id"], 2);
    assert_eq!(body["result"]["structuredContent"]["text"], "over http");
}

#[tokio::test]
async fn test_invalid_json_is_a_parse_error() {
    let transport = transport(None);
    let response = transport
        .router()
        .oneshot(post("{oops", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["id"].is_null());
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_shutdown_closes_session_once_idle() {
    let transport = transport(None);
    transport
        .router()
        .oneshot(post(&initialize(), None))
        .await
        .unwrap();

    let shutdown = json!({ "jsonrpc": "2.0", "id": 2, "method": "shutdown" });
    let response = transport
        .router()
        .oneshot(post(&shutdown.to_string(), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["id"], 2);

    let response = transport
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["session"], "closed");
    assert_eq!(body["in_flight"], 0);

    let ping = json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" });
    let response = transport
        .router()
        .oneshot(post(&ping.to_string(), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["error"]["code"], -32003);
}
