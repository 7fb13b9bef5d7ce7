//! `application/x-www-form-urlencoded` decoder.

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::http::parse::content_type::{Charset, DecodeError};
use crate::http::parse::json::POLLUTING_KEY;

/// Decodes a form body into an object of strings. A repeated key keeps its
/// last value.
pub fn decode_urlencoded(bytes: &[u8], charset: Charset) -> Result<Value, DecodeError> {
    let text = charset.decode(bytes)?;
    let mut out = Map::new();
    for (key, value) in form_urlencoded::parse(text.as_bytes()) {
        if key == POLLUTING_KEY {
            continue;
        }
        out.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    Ok(Value::Object(out))
}
