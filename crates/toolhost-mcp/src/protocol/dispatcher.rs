//! Request dispatcher: admits inbound messages against the session state,
//! resolves them to a capability, runs it and encodes the outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use toolhost::{validate, Capability, CapabilityKind};

use crate::session::{InFlightGuard, Session, SessionState};
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::validator::{decode_envelope, Inbound};

/// Methods that expect a response. Sent without an id they are malformed, not notifications.
const REQUEST_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "shutdown",
    "capabilities/list",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
];

/// Where a request is in its lifetime. Used for tracing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Validated,
    Executing,
    Completed,
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestPhase::Received => "received",
            RequestPhase::Validated => "validated",
            RequestPhase::Executing => "executing",
            RequestPhase::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Outcome of admitting one inbound message.
#[derive(Debug)]
pub enum Routed {
    /// Answer immediately without running anything.
    Reply(Value),
    /// Nothing to send (notifications, stray responses).
    Silent,
    /// An admitted request holding its id in the in-flight set.
    Execute(PendingRequest),
}

/// A request that passed envelope, id and state checks.
///
/// Its id stays in the session's in-flight set until this value (or the guard
/// taken from it) is dropped, so callers release it only once the response
/// has been written.
#[derive(Debug)]
pub struct PendingRequest {
    request: JsonRpcRequest,
    guard: InFlightGuard,
}

impl PendingRequest {
    pub fn id(&self) -> &RequestId {
        &self.request.id
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    /// Lifecycle requests that must finish before the next message is read.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self.request.method.as_str(), "initialize" | "shutdown")
    }

    /// Give up the request and keep only its in-flight claim.
    pub fn into_guard(self) -> InFlightGuard {
        self.guard
    }
}

/// Dispatches JSON-RPC messages for one session. Cheap to clone into request tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    session: Arc<Session>,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Admit and run one message to completion.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        match self.route(message) {
            Routed::Reply(response) => Some(response),
            Routed::Silent => None,
            Routed::Execute(pending) => {
                let response = self.execute(&pending).await;
                drop(pending);
                Some(response)
            }
        }
    }

    /// Decode the envelope, claim the request id and check the session state.
    pub fn route(&self, message: Value) -> Routed {
        let request = match decode_envelope(message) {
            Ok(Inbound::Request(request)) => request,
            Ok(Inbound::Notification(notification)) => {
                return self.handle_notification(notification)
            }
            Ok(Inbound::Response) => {
                tracing::warn!("Ignoring response message from client");
                return Routed::Silent;
            }
            Err(rejected) => {
                tracing::warn!("Rejected message: {}", rejected.error);
                return Routed::Reply(error_value(rejected.id, &rejected.error));
            }
        };

        let Some(guard) = self.session.inflight().try_acquire(&request.id) else {
            tracing::warn!(
                "Request id {} is already in flight, rejecting duplicate {}",
                request.id,
                request.method
            );
            let error = McpError::MalformedRequest(format!(
                "request id {} is already in flight",
                request.id
            ));
            return Routed::Reply(error_value(RequestId::Null, &error));
        };

        if let Err(e) = self.admit(&request.method) {
            tracing::debug!("Request {} ({}) refused: {e}", request.id, request.method);
            return Routed::Reply(error_value(request.id, &e));
        }

        self.trace_phase(&request, RequestPhase::Received);
        Routed::Execute(PendingRequest { request, guard })
    }

    fn admit(&self, method: &str) -> McpResult<()> {
        match self.session.state() {
            SessionState::Uninitialized => match method {
                "initialize" | "ping" => Ok(()),
                _ => Err(McpError::NotReady(format!(
                    "'{method}' requires a completed initialize handshake"
                ))),
            },
            SessionState::Ready => match method {
                "initialize" => Err(McpError::MalformedRequest(
                    "session is already initialized".to_string(),
                )),
                _ => Ok(()),
            },
            SessionState::ShuttingDown => Err(McpError::ShuttingDown),
            SessionState::Closed => Err(McpError::NotReady("session is closed".to_string())),
        }
    }

    /// Run an admitted request and encode exactly one response for it.
    pub async fn execute(&self, pending: &PendingRequest) -> Value {
        let request = &pending.request;
        let result = self.dispatch(request).await;
        let elapsed_ms = pending.guard.elapsed_ms();

        match result {
            Ok(value) => {
                tracing::debug!(
                    "Request {} ({}) {} ok in {elapsed_ms}ms",
                    request.id,
                    request.method,
                    RequestPhase::Completed
                );
                serde_json::to_value(JsonRpcResponse::new(request.id.clone(), value))
                    .unwrap_or_default()
            }
            Err(e) => {
                tracing::debug!(
                    "Request {} ({}) {} with {} in {elapsed_ms}ms: {e}",
                    request.id,
                    request.method,
                    RequestPhase::Completed,
                    e.kind()
                );
                error_value(request.id.clone(), &e)
            }
        }
    }

    async fn dispatch(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,
            "ping" => Ok(json!({})),
            "shutdown" => self.handle_shutdown(),

            "capabilities/list" => self.handle_capabilities_list(),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(request).await,

            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) -> Routed {
        if REQUEST_METHODS.contains(&notification.method.as_str()) {
            tracing::warn!("Request '{}' sent without an id", notification.method);
            let error = McpError::MalformedRequest(format!(
                "'{}' is a request and needs an id",
                notification.method
            ));
            return Routed::Reply(error_value(RequestId::Null, &error));
        }

        if self.session.state() == SessionState::Uninitialized {
            tracing::debug!(
                "Dropping notification {} before initialize",
                notification.method
            );
            return Routed::Silent;
        }

        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                tracing::info!("Client confirmed initialization");
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                let target = notification
                    .params
                    .and_then(|p| serde_json::from_value::<CancelRequestParams>(p).ok())
                    .map(|p| p.request_id.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::info!("Client cancelled request {target}; it will run to completion");
            }
            other => {
                tracing::debug!("Unknown notification: {other}");
            }
        }
        Routed::Silent
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = decode_params(params, "initialize")?;

        let negotiated = match NegotiatedCapabilities::negotiate(params) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                tracing::warn!("Closing session {}: {e}", self.session.id());
                self.session.close();
                return Err(e);
            }
        };

        let result = InitializeResult::for_version(&negotiated.protocol_version);
        if !self.session.mark_ready(negotiated).await {
            return Err(McpError::MalformedRequest(
                "session is already initialized".to_string(),
            ));
        }
        encode(result)
    }

    fn handle_shutdown(&self) -> McpResult<Value> {
        tracing::info!("Shutdown requested for session {}", self.session.id());
        self.session.begin_shutdown();
        Ok(json!({}))
    }

    fn handle_capabilities_list(&self) -> McpResult<Value> {
        encode(CapabilityListResult {
            capabilities: self.session.registry().list(),
        })
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        let tools = self
            .session
            .registry()
            .list_kind(CapabilityKind::Tool)
            .iter()
            .map(ToolDefinition::from)
            .collect();
        encode(ToolListResult {
            tools,
            next_cursor: None,
        })
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let params: ToolCallParams = decode_params(request.params.clone(), "tools/call")?;
        let capability = self
            .session
            .registry()
            .lookup_kind(&params.name, CapabilityKind::Tool)?;

        let payload = self.invoke(request, capability, params.arguments).await?;
        encode(ToolCallResult::from_payload(payload))
    }

    fn handle_resources_list(&self) -> McpResult<Value> {
        let resources = self
            .session
            .registry()
            .list_kind(CapabilityKind::Resource)
            .iter()
            .map(ResourceDefinition::from)
            .collect();
        encode(ResourceListResult {
            resources,
            next_cursor: None,
        })
    }

    async fn handle_resources_read(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let params: ResourceReadParams = decode_params(request.params.clone(), "resources/read")?;
        let capability = self
            .session
            .registry()
            .lookup_kind(&params.uri, CapabilityKind::Resource)?;

        let payload = self.invoke(request, capability, params.arguments).await?;
        encode(ReadResourceResult::json(&params.uri, &payload))
    }

    /// Validate arguments, then run the handler under the session's timeout.
    ///
    /// Handler failures, panics and timeouts all become `McpError::Handler`.
    async fn invoke(
        &self,
        request: &JsonRpcRequest,
        capability: &Capability,
        arguments: Option<Value>,
    ) -> McpResult<Value> {
        let arguments = validate(capability.contract(), &arguments.unwrap_or(Value::Null))?;
        self.trace_phase(request, RequestPhase::Validated);

        let timeout = self.session.tool_timeout();
        self.trace_phase(request, RequestPhase::Executing);
        let call = AssertUnwindSafe(capability.invoke(arguments)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(e))) => {
                tracing::debug!("{} '{}' failed: {e}", capability.kind(), capability.name());
                Err(McpError::Handler(e.message))
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    "{} '{}' panicked: {message}",
                    capability.kind(),
                    capability.name()
                );
                Err(McpError::Handler(format!("handler panicked: {message}")))
            }
            Err(_) => {
                tracing::warn!(
                    "{} '{}' timed out after {timeout:?}",
                    capability.kind(),
                    capability.name()
                );
                Err(McpError::Handler(format!("timed out after {timeout:?}")))
            }
        }
    }

    fn trace_phase(&self, request: &JsonRpcRequest, phase: RequestPhase) {
        tracing::debug!(
            "Session {} request {} ({}) {phase}",
            self.session.id(),
            request.id,
            request.method
        );
    }
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> McpResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::MalformedRequest(format!("invalid {method} params: {e}")))?
        .ok_or_else(|| McpError::MalformedRequest(format!("{method} params required")))
}

fn encode<T: Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::Internal(e.to_string()))
}

/// Encode an error response for `id`.
pub fn error_value(id: RequestId, error: &McpError) -> Value {
    serde_json::to_value(error.to_json_rpc_error(id)).unwrap_or_default()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
