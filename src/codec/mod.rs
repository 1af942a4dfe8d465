// Request/response body codec
// Author: kelexine (https://github.com/kelexine)

use crate::error::{GatewayError, Result};
use bytes::Bytes;
use serde_json::Value;

/// Turns request bodies into bytes and response bytes into values.
///
/// The dispatcher only calls `encode` for operations that were given a body.
pub trait BodyCodec: Send + Sync {
    /// Content type sent with encoded bodies unless the request already has one.
    fn content_type(&self) -> &str;

    fn encode(&self, body: &Value) -> Result<Bytes>;

    /// Decode one element. An empty input decodes to `null`.
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl BodyCodec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, body: &Value) -> Result<Bytes> {
        serde_json::to_vec(body)
            .map(Bytes::from)
            .map_err(|e| GatewayError::Codec(format!("Failed to encode body: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::Codec(format!("Failed to decode body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_encode() {
        let bytes = JsonCodec.encode(&json!({"name": "octo"})).unwrap();
        assert_eq!(&bytes[..], br#"{"name":"octo"}"#);
    }

    #[test]
    fn test_json_codec_decode() {
        assert_eq!(JsonCodec.decode(b"[1,2]").unwrap(), json!([1, 2]));
        assert_eq!(JsonCodec.decode(b"").unwrap(), Value::Null);
        assert_eq!(JsonCodec.decode(b"  \n").unwrap(), Value::Null);
        assert!(JsonCodec.decode(b"{not json").is_err());
    }
}
