//! Envelope decoding: turns one parsed JSON value into a request, notification or rejection.

use serde_json::Value;

use crate::types::{
    JsonRpcNotification, JsonRpcRequest, McpError, RequestId, JSONRPC_VERSION,
};

/// An inbound message after structural checks.
#[derive(Debug)]
pub enum Inbound {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A response or error object sent by the client; this server issues no requests.
    Response,
}

/// Rejection carrying whatever id could be recovered (null if none).
#[derive(Debug)]
pub struct Rejected {
    pub id: RequestId,
    pub error: McpError,
}

fn reject(id: RequestId, message: impl Into<String>) -> Rejected {
    Rejected {
        id,
        error: McpError::MalformedRequest(message.into()),
    }
}

fn decode_id(raw: &Value) -> Option<RequestId> {
    match raw {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

/// Validate the JSON-RPC envelope of an inbound message.
pub fn decode_envelope(message: Value) -> Result<Inbound, Rejected> {
    let Value::Object(mut fields) = message else {
        return Err(reject(RequestId::Null, "message must be a JSON object"));
    };

    let id = match fields.remove("id") {
        None => None,
        Some(raw) => match decode_id(&raw) {
            Some(id) => Some(id),
            None => {
                return Err(reject(
                    RequestId::Null,
                    format!("request id must be a string or signed 64-bit integer, got {raw}"),
                ))
            }
        },
    };
    let reply_id = id.clone().unwrap_or(RequestId::Null);

    match fields.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        other => {
            return Err(reject(
                reply_id,
                format!(
                    "Expected jsonrpc version \"{JSONRPC_VERSION}\", got {}",
                    other.map(|v| format!("\"{v}\"")).unwrap_or_else(|| "none".to_string())
                ),
            ))
        }
    }

    let method = match fields.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        Some(Value::String(_)) => {
            return Err(reject(reply_id, "Method name must not be empty"))
        }
        Some(_) => return Err(reject(reply_id, "Method name must be a string")),
        None if fields.contains_key("result") || fields.contains_key("error") => {
            return Ok(Inbound::Response)
        }
        None => return Err(reject(reply_id, "Missing method")),
    };

    let params = fields.remove("params");
    Ok(match id {
        Some(id) => Inbound::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params,
        }),
        None => Inbound::Notification(JsonRpcNotification::new(method, params)),
    })
}
