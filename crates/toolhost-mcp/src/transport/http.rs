//! HTTP transport: `POST /mcp` carries one JSON-RPC message, `GET /health` reports status.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json as AxumJson, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::protocol::{error_value, Dispatcher};
use crate::types::{McpError, McpResult, RequestId};

use super::framing::parse_message;

/// Shared server state passed to all handlers via axum State.
pub struct HttpState {
    pub token: Option<String>,
    pub dispatcher: Dispatcher,
}

/// HTTP transport: one session for the whole server process.
pub struct HttpTransport {
    state: Arc<HttpState>,
}

impl HttpTransport {
    pub fn new(dispatcher: Dispatcher, token: Option<String>) -> Self {
        Self {
            state: Arc::new(HttpState { token, dispatcher }),
        }
    }

    pub fn router(&self) -> Router {
        let state = self.state.clone();

        Router::new()
            .route("/mcp", post(handle_request))
            .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
            .with_state(state)
    }

    /// Run the HTTP server on the given address.
    pub async fn run(&self, addr: &str) -> McpResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(McpError::Io)?;

        tracing::info!("HTTP transport listening on {addr}");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Checks the bearer token when one is configured. `/health` bypasses this layer.
async fn auth_layer(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    if let Some(expected) = &state.token {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            tracing::warn!("Rejected unauthenticated request");
            return (
                StatusCode::UNAUTHORIZED,
                AxumJson(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32900,
                        "message": "Unauthorized"
                    }
                })),
            )
                .into_response();
        }
    }

    next.run(request).await
}

async fn handle_request(State(state): State<Arc<HttpState>>, body: String) -> Response {
    let message = match parse_message(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Parse error: {e}");
            return (
                StatusCode::BAD_REQUEST,
                AxumJson(error_value(RequestId::Null, &e)),
            )
                .into_response();
        }
    };

    let reply = state.dispatcher.handle_message(message).await;
    let session = state.dispatcher.session();
    if session.close_if_drained() {
        tracing::info!("Session {} closed", session.id());
    }

    match reply {
        Some(response) => AxumJson(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Health check endpoint: no auth required.
async fn handle_health(State(state): State<Arc<HttpState>>) -> AxumJson<serde_json::Value> {
    let session = state.dispatcher.session();
    AxumJson(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "session": session.state(),
        "capabilities": session.registry().len(),
        "in_flight": session.inflight().len(),
    }))
}
