//! Built-in tool implementations.

pub mod api;
pub mod clock;
pub mod data;
pub mod echo;
pub mod files;
pub mod lm_studio;
pub mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

use toolhost::{Arguments, HandlerResult};

pub use registry::{builtin_capabilities, BUILTIN_TOOLS};

/// Deserialize validated arguments into a tool's parameter struct.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Arguments) -> HandlerResult<T> {
    Ok(serde_json::from_value(Value::Object(args))?)
}
