//! Error taxonomy for the server and its JSON-RPC encoding.

use serde_json::{json, Value};

use toolhost::{RegistryError, ValidationError};

use super::message::{JsonRpcError, JsonRpcErrorObject, RequestId, JSONRPC_VERSION};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Server-defined error codes (JSON-RPC reserves -32000 to -32099 for these).
pub mod server_error_codes {
    pub const HANDLER_ERROR: i32 = -32000;
    pub const NOT_FOUND: i32 = -32002;
    pub const NOT_READY: i32 = -32003;
    pub const SHUTTING_DOWN: i32 = -32004;
    pub const VERSION_MISMATCH: i32 = -32005;
}

/// All errors that can occur in the MCP server.
#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Capability not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Session not ready: {0}")]
    NotReady(String),

    #[error("Session is shutting down")]
    ShuttingDown,

    #[error("Unsupported protocol version {requested}, server supports {}", .supported.join(", "))]
    VersionMismatch {
        requested: String,
        supported: Vec<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use server_error_codes::*;
        match self {
            McpError::Parse(_) | McpError::Json(_) => PARSE_ERROR,
            McpError::MalformedRequest(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::NotFound(_) => NOT_FOUND,
            McpError::Validation(_) => INVALID_PARAMS,
            McpError::Handler(_) => HANDLER_ERROR,
            McpError::NotReady(_) => NOT_READY,
            McpError::ShuttingDown => SHUTTING_DOWN,
            McpError::VersionMismatch { .. } => VERSION_MISMATCH,
            McpError::Internal(_)
            | McpError::Transport(_)
            | McpError::Config(_)
            | McpError::Io(_) => INTERNAL_ERROR,
        }
    }

    /// Stable machine-readable kind carried in `error.data.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Parse(_) | McpError::Json(_) => "parse_error",
            McpError::MalformedRequest(_) => "malformed_request",
            McpError::MethodNotFound(_) => "method_not_found",
            McpError::NotFound(_) => "not_found",
            McpError::Validation(_) => "validation_error",
            McpError::Handler(_) => "handler_error",
            McpError::NotReady(_) => "not_ready",
            McpError::ShuttingDown => "shutting_down",
            McpError::VersionMismatch { .. } => "version_mismatch",
            McpError::Transport(_) | McpError::Io(_) => "transport_error",
            McpError::Internal(_) | McpError::Config(_) => "internal_error",
        }
    }

    fn details(&self) -> Value {
        match self {
            McpError::Validation(e) => json!(e.messages()),
            McpError::VersionMismatch { requested, supported } => json!({
                "requested": requested,
                "supported": supported,
            }),
            _ => Value::Null,
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        let mut data = json!({ "kind": self.kind() });
        let details = self.details();
        if !details.is_null() {
            data["details"] = details;
        }

        JsonRpcError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcErrorObject {
                code: self.code(),
                message: self.to_string(),
                data: Some(data),
            },
        }
    }
}

impl From<RegistryError> for McpError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(name) => McpError::NotFound(name),
            other => McpError::Internal(other.to_string()),
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;
