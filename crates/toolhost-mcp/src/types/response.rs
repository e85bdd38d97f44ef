//! MCP response types for discovery, tool calls and resource reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolhost::CapabilitySummary;

/// MIME type of every resource body this server produces.
pub const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(
        default,
        rename = "structuredContent",
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<Value>,
}

impl ToolCallResult {
    /// Render a handler payload: strings pass through, anything else is pretty JSON.
    pub fn from_payload(payload: Value) -> Self {
        let text = match &payload {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|e| e.to_string()),
        };
        Self {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(payload),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<&CapabilitySummary> for ToolDefinition {
    fn from(summary: &CapabilitySummary) -> Self {
        Self {
            name: summary.name.clone(),
            description: summary.description.clone(),
            input_schema: summary.input_contract.to_json_schema(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResult {
    pub tools: Vec<ToolDefinition>,
    #[serde(default, rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl From<&CapabilitySummary> for ResourceDefinition {
    fn from(summary: &CapabilitySummary) -> Self {
        let name = summary
            .name
            .split_once("://")
            .map(|(scheme, rest)| format!("{scheme} {rest}"))
            .unwrap_or_else(|| summary.name.clone());
        Self {
            uri: summary.name.clone(),
            name,
            description: summary.description.clone(),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceListResult {
    pub resources: Vec<ResourceDefinition>,
    #[serde(default, rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

impl ReadResourceResult {
    pub fn json(uri: &str, payload: &Value) -> Self {
        let text = serde_json::to_string_pretty(payload).unwrap_or_else(|e| e.to_string());
        Self {
            contents: vec![ResourceContent {
                uri: uri.to_string(),
                mime_type: Some(JSON_MIME_TYPE.to_string()),
                text: Some(text),
            }],
        }
    }
}

/// Result of `capabilities/list`: every capability in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityListResult {
    pub capabilities: Vec<CapabilitySummary>,
}
