//! `application/json` decoder.

use serde_json::Value;

use crate::http::parse::content_type::{Charset, DecodeError};

/// Key that is never copied into a decoded object.
pub const POLLUTING_KEY: &str = "__proto__";

pub fn decode_json(bytes: &[u8], charset: Charset) -> Result<Value, DecodeError> {
    let parsed: Value = match charset {
        Charset::Binary | Charset::Utf8 => {
            serde_json::from_slice(bytes).map_err(DecodeError::InvalidJson)?
        }
        other => {
            let text = other.decode(bytes)?;
            serde_json::from_str(&text).map_err(DecodeError::InvalidJson)?
        }
    };
    Ok(strip_polluting_keys(parsed))
}

/// Removes `__proto__` keys at every depth.
pub fn strip_polluting_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != POLLUTING_KEY)
                .map(|(k, v)| (k, strip_polluting_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_polluting_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_proto_keys() {
        let out = decode_json(
            br#"{"__proto__":{"admin":true},"user":{"__proto__":1,"name":"x"}}"#,
            Charset::Binary,
        )
        .unwrap();
        assert_eq!(out, json!({"user": {"name": "x"}}));
    }

    #[test]
    fn test_malformed_json_is_client_error() {
        let err = decode_json(b"{\"a\":", Charset::Binary).unwrap_err();
        assert_eq!(err.to_string(), "Could not parse the payload as JSON content!");
    }

    #[test]
    fn test_utf16_payload() {
        let bytes: Vec<u8> = "[1,2]".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(decode_json(&bytes, Charset::Utf16Le).unwrap(), json!([1, 2]));
    }
}
