//! The `call_api` tool: make an HTTP request through the shared client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use toolhost::{
    Arguments, Capability, Handler, HandlerError, HandlerResult, InputContract, ParamSpec,
};

use super::parse_args;

#[derive(Debug, Deserialize)]
struct ApiParams {
    url: String,
    method: String,
    #[serde(default)]
    headers: Option<Map<String, Value>>,
    #[serde(default)]
    body: Option<Value>,
}

struct CallApi {
    client: reqwest::Client,
}

#[async_trait]
impl Handler for CallApi {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let params: ApiParams = parse_args(args)?;
        let method = reqwest::Method::from_bytes(params.method.as_bytes())
            .map_err(|_| HandlerError::new(format!("invalid HTTP method {}", params.method)))?;

        let mut request = self.client.request(method.clone(), &params.url);
        for (name, value) in params.headers.iter().flatten() {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            request = request.header(name.as_str(), value);
        }
        if let Some(body) = &params.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HandlerError::new(format!("Request to {} timed out", params.url))
            } else {
                HandlerError::new(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
                )
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| HandlerError::new(format!("Failed to read response body: {e}")))?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        tracing::info!("API call: {method} {} - Status: {status}", params.url);
        Ok(json!({
            "status_code": status,
            "headers": headers,
            "data": data,
        }))
    }
}

pub fn capability(client: reqwest::Client) -> Capability {
    Capability::tool(
        "call_api",
        InputContract::new()
            .param(ParamSpec::string("url").required().description("API endpoint URL"))
            .param(
                ParamSpec::enumeration("method", ["GET", "POST", "PUT", "DELETE"])
                    .default("GET")
                    .description("HTTP method"),
            )
            .param(ParamSpec::object("headers").description("HTTP headers"))
            .param(ParamSpec::object("body").description("JSON request body")),
        std::sync::Arc::new(CallApi { client }),
    )
    .with_description("Make an HTTP API call and return status, headers and body")
}
