//! `text/plain` decoder.

use serde_json::Value;

use crate::http::parse::content_type::{Charset, DecodeError};

pub fn decode_text(bytes: &[u8], charset: Charset) -> Result<Value, DecodeError> {
    charset.decode(bytes).map(Value::String)
}
