//! LM Studio tools: text generation, chat, model listing and a connection probe.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use toolhost::handler::optional_u64;
use toolhost::{Arguments, Capability, Handler, HandlerResult, InputContract, ParamSpec};

use crate::clients::LmStudioClient;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct GenerateParams {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatParams {
    messages: Vec<Value>,
    #[serde(default)]
    model: Option<String>,
    temperature: f64,
}

static NO_CHOICE: Value = Value::Null;

fn first_choice(response: &Value) -> &Value {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .unwrap_or(&NO_CHOICE)
}

/// Integer arguments may arrive as whole floats (`100.0`), which serde will not read as `u64`.
fn max_tokens_arg(args: &Arguments, default: u64) -> HandlerResult<u64> {
    Ok(optional_u64(args, "max_tokens")?.unwrap_or(default))
}

fn usage(response: &Value) -> Value {
    response.get("usage").cloned().unwrap_or_else(|| json!({}))
}

struct Generate(Arc<LmStudioClient>);
struct Chat(Arc<LmStudioClient>);
struct ListModels(Arc<LmStudioClient>);
struct TestConnection(Arc<LmStudioClient>);

#[async_trait]
impl Handler for Generate {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let max_tokens = max_tokens_arg(&args, 100)?;
        let params: GenerateParams = parse_args(args)?;
        let model = self.0.resolve_model(params.model.as_deref()).await?;
        let response = self
            .0
            .post(
                "/v1/completions",
                &json!({
                    "model": model,
                    "prompt": params.prompt,
                    "max_tokens": max_tokens,
                    "temperature": params.temperature,
                }),
            )
            .await?;

        let choice = first_choice(&response);
        Ok(json!({
            "text": choice.get("text").and_then(Value::as_str).unwrap_or_default(),
            "model": model,
            "usage": usage(&response),
            "finish_reason": choice.get("finish_reason").and_then(Value::as_str).unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl Handler for Chat {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let max_tokens = max_tokens_arg(&args, 500)?;
        let params: ChatParams = parse_args(args)?;
        let model = self.0.resolve_model(params.model.as_deref()).await?;
        let response = self
            .0
            .post(
                "/v1/chat/completions",
                &json!({
                    "model": model,
                    "messages": params.messages,
                    "temperature": params.temperature,
                    "max_tokens": max_tokens,
                }),
            )
            .await?;

        let choice = first_choice(&response);
        Ok(json!({
            "message": choice.get("message").cloned().unwrap_or_else(|| json!({})),
            "model": model,
            "usage": usage(&response),
            "finish_reason": choice.get("finish_reason").and_then(Value::as_str).unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl Handler for ListModels {
    async fn call(&self, _args: Arguments) -> HandlerResult<Value> {
        let models = self.0.list_models().await?;
        Ok(json!({ "count": models.len(), "models": models }))
    }
}

#[async_trait]
impl Handler for TestConnection {
    /// Never fails: an unreachable backend is reported as `disconnected`.
    async fn call(&self, _args: Arguments) -> HandlerResult<Value> {
        match self.0.list_models().await {
            Ok(models) => Ok(json!({
                "status": "connected",
                "url": self.0.base_url(),
                "models_count": models.len(),
                "models": models
                    .iter()
                    .map(|m| m.get("id").and_then(Value::as_str).unwrap_or("unknown"))
                    .collect::<Vec<_>>(),
            })),
            Err(e) => Ok(json!({
                "status": "disconnected",
                "url": self.0.base_url(),
                "error": e.message,
            })),
        }
    }
}

fn model_param() -> ParamSpec {
    ParamSpec::string("model").description("Model id; defaults to the first loaded model")
}

fn temperature_param() -> ParamSpec {
    ParamSpec::number("temperature")
        .default(0.7)
        .description("Sampling temperature")
}

/// The four LM Studio tools sharing one client.
pub fn capabilities(client: Arc<LmStudioClient>) -> Vec<Capability> {
    vec![
        Capability::tool(
            "lm_studio_generate",
            InputContract::new()
                .param(ParamSpec::string("prompt").required().description("Input prompt"))
                .param(model_param())
                .param(
                    ParamSpec::integer("max_tokens")
                        .default(100)
                        .description("Maximum tokens to generate"),
                )
                .param(temperature_param()),
            Arc::new(Generate(Arc::clone(&client))),
        )
        .with_description("Generate text with a local LM Studio model"),
        Capability::tool(
            "lm_studio_chat",
            InputContract::new()
                .param(
                    ParamSpec::array("messages")
                        .required()
                        .description("Chat messages with role and content"),
                )
                .param(model_param())
                .param(temperature_param())
                .param(
                    ParamSpec::integer("max_tokens")
                        .default(500)
                        .description("Maximum tokens to generate"),
                ),
            Arc::new(Chat(Arc::clone(&client))),
        )
        .with_description("Chat completion with a local LM Studio model"),
        Capability::tool(
            "lm_studio_list_models",
            InputContract::new(),
            Arc::new(ListModels(Arc::clone(&client))),
        )
        .with_description("List models available in LM Studio"),
        Capability::tool(
            "lm_studio_test_connection",
            InputContract::new(),
            Arc::new(TestConnection(client)),
        )
        .with_description("Check whether LM Studio is reachable"),
    ]
}
