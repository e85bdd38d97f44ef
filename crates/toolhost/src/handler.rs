//! The handler boundary: executable logic bound to a capability.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::types::{HandlerError, HandlerResult};

/// Validated, defaulted arguments handed to a handler.
pub type Arguments = Map<String, Value>;

/// Executable logic behind a capability.
///
/// Handlers see only their arguments. They must not assume anything about
/// the transport or session that delivered the call.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, args: Arguments) -> HandlerResult<Value>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<Value>> + Send,
{
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        (self.0)(args).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Read a non-negative integer argument.
///
/// Whole floats (`100.0`) are accepted.
/// A value that is present but negative or fractional is an error rather
/// than silently replaced.
pub fn optional_u64(args: &Arguments, name: &str) -> HandlerResult<Option<u64>> {
    let Some(value) = args.get(name).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })
        .map(Some)
        .ok_or_else(|| {
            HandlerError::new(format!(
                "argument '{name}' must be a non-negative integer, got {value}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_handler_roundtrip() {
        let handler = handler_fn(|args: Arguments| async move {
            let text = args.get("text").cloned().unwrap_or(Value::Null);
            Ok::<Value, HandlerError>(json!({ "text": text }))
        });

        let mut args = Arguments::new();
        args.insert("text".to_string(), json!("hi"));
        let out = handler.call(args).await.unwrap();
        assert_eq!(out, json!({ "text": "hi" }));
    }

    #[tokio::test]
    async fn test_fn_handler_propagates_failure() {
        let handler = handler_fn(|_args: Arguments| async move {
            Err::<Value, _>(HandlerError::new("backend unavailable"))
        });
        let err = handler.call(Arguments::new()).await.unwrap_err();
        assert_eq!(err.message, "backend unavailable");
    }

    #[test]
    fn test_optional_u64() {
        let mut args = Arguments::new();
        args.insert("n".to_string(), json!(100));
        args.insert("whole".to_string(), json!(250.0));
        args.insert("nothing".to_string(), Value::Null);
        args.insert("negative".to_string(), json!(-1));
        args.insert("fraction".to_string(), json!(1.5));
        args.insert("text".to_string(), json!("ten"));

        assert_eq!(optional_u64(&args, "n").unwrap(), Some(100));
        assert_eq!(optional_u64(&args, "whole").unwrap(), Some(250));
        assert_eq!(optional_u64(&args, "missing").unwrap(), None);
        assert_eq!(optional_u64(&args, "nothing").unwrap(), None);

        let err = optional_u64(&args, "negative").unwrap_err();
        assert!(err.message.contains("'negative'"));
        assert!(err.message.contains("-1"));
        assert!(optional_u64(&args, "fraction").is_err());
        assert!(optional_u64(&args, "text").is_err());
    }
}
