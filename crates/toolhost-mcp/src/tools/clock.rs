//! The `get_current_time` tool: the server's clock in a few formats.

use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use toolhost::{handler_fn, Arguments, Capability, HandlerResult, InputContract, ParamSpec};

use super::parse_args;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TimeFormat {
    Iso,
    Unix,
    Readable,
}

#[derive(Debug, Deserialize)]
struct TimeParams {
    format: TimeFormat,
}

pub fn capability() -> Capability {
    Capability::tool(
        "get_current_time",
        InputContract::new().param(
            ParamSpec::enumeration("format", ["iso", "unix", "readable"])
                .default("iso")
                .description("Output format"),
        ),
        handler_fn(execute),
    )
    .with_description("Get the current server time")
}

async fn execute(args: Arguments) -> HandlerResult<Value> {
    let params: TimeParams = parse_args(args)?;
    let out = match params.format {
        TimeFormat::Iso => json!({ "time": Local::now().to_rfc3339(), "format": "iso" }),
        TimeFormat::Unix => json!({ "time": Utc::now().timestamp(), "format": "unix" }),
        TimeFormat::Readable => json!({
            "time": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            "format": "readable",
        }),
    };
    Ok(out)
}
