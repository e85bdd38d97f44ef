//! The `echo` tool: return the given text unchanged.

use serde::Deserialize;
use serde_json::{json, Value};

use toolhost::{handler_fn, Arguments, Capability, HandlerResult, InputContract, ParamSpec};

use super::parse_args;

#[derive(Debug, Deserialize)]
struct EchoParams {
    text: String,
}

pub fn capability() -> Capability {
    Capability::tool(
        "echo",
        InputContract::new().param(
            ParamSpec::string("text")
                .required()
                .description("Text to echo back"),
        ),
        handler_fn(execute),
    )
    .with_description("Echo the given text back to the caller")
}

async fn execute(args: Arguments) -> HandlerResult<Value> {
    let params: EchoParams = parse_args(args)?;
    Ok(json!({ "text": params.text }))
}
