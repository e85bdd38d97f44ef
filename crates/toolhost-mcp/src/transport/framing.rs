//! Message framing for newline-delimited JSON.

use serde_json::Value;
use tokio_util::codec::LinesCodec;

use crate::types::{McpError, McpResult};

/// Default upper bound on one framed message (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Line codec that refuses frames longer than `max_message_bytes`.
pub fn line_codec(max_message_bytes: usize) -> LinesCodec {
    LinesCodec::new_with_max_length(max_message_bytes)
}

/// Parse a single line of text as a JSON value.
pub fn parse_message(line: &str) -> McpResult<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(McpError::Parse("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| McpError::Parse(e.to_string()))
}

/// Serialize a value to one line of JSON. The codec appends the newline.
pub fn encode_message(value: &Value) -> McpResult<String> {
    serde_json::to_string(value).map_err(McpError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::{FramedRead, LinesCodecError};

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_message("{not json").unwrap_err();
        assert_eq!(err.code(), -32700);
        assert!(parse_message("   ").is_err());
    }

    #[test]
    fn test_encoded_message_is_single_line() {
        let line = encode_message(&serde_json::json!({"a": "x\ny"})).unwrap();
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn test_codec_enforces_max_length() {
        let input: &[u8] = b"0123456789abcdef\n";
        let mut frames = FramedRead::new(input, line_codec(8));
        assert!(matches!(
            frames.next().await,
            Some(Err(LinesCodecError::MaxLineLengthExceeded))
        ));
    }
}
