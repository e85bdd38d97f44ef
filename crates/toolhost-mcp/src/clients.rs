//! External collaborators shared by handlers: the HTTP client and the LM Studio backend.
//!
//! Built once at startup and handed to the handlers that need them; dropped
//! together with the registry when the server stops.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use toolhost::{HandlerError, HandlerResult};

use crate::config::{LmStudioConfig, ServerConfig};
use crate::types::{McpError, McpResult};

const USER_AGENT: &str = concat!("toolhost-mcp/", env!("CARGO_PKG_VERSION"));

/// Owned handles to everything outside the process.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub http: reqwest::Client,
    pub lm_studio: Option<Arc<LmStudioClient>>,
}

impl Collaborators {
    pub fn from_config(config: &ServerConfig) -> McpResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| McpError::Config(format!("cannot build HTTP client: {e}")))?;

        let lm_studio = if config.lm_studio.enabled {
            let client = LmStudioClient::new(&config.lm_studio)?;
            tracing::info!("LM Studio backend at {}", client.base_url());
            Some(Arc::new(client))
        } else {
            None
        };

        Ok(Self { http, lm_studio })
    }
}

/// Client for the OpenAI-compatible API served by LM Studio.
#[derive(Debug)]
pub struct LmStudioClient {
    http: reqwest::Client,
    base_url: String,
}

impl LmStudioClient {
    pub fn new(config: &LmStudioConfig) -> McpResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| McpError::Config(format!("cannot build LM Studio client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn map_error(&self, e: reqwest::Error) -> HandlerError {
        if e.is_connect() {
            HandlerError::new(format!(
                "Cannot connect to LM Studio at {}. Make sure LM Studio is running with the local server enabled.",
                self.base_url
            ))
        } else if e.is_timeout() {
            HandlerError::new(format!("LM Studio at {} timed out", self.base_url))
        } else if let Some(status) = e.status() {
            HandlerError::new(format!("LM Studio API error: {status}"))
        } else {
            HandlerError::new(format!("LM Studio request failed: {e}"))
        }
    }

    /// Entries of `GET /v1/models`.
    pub async fn list_models(&self) -> HandlerResult<Vec<Value>> {
        let response = self
            .http
            .get(self.url("/v1/models"))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.map_error(e))?;
        let body: Value = response.json().await.map_err(|e| self.map_error(e))?;

        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Use `requested` if given, otherwise the first model the server lists.
    pub async fn resolve_model(&self, requested: Option<&str>) -> HandlerResult<String> {
        if let Some(model) = requested.filter(|m| !m.is_empty()) {
            return Ok(model.to_string());
        }
        let models = self.list_models().await?;
        let model = models
            .first()
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::new("No models available in LM Studio"))?;
        tracing::debug!("Using default LM Studio model {model}");
        Ok(model.to_string())
    }

    pub async fn post(&self, path: &str, body: &Value) -> HandlerResult<Value> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.map_error(e))?;
        response.json().await.map_err(|e| self.map_error(e))
    }
}
