//! Content decoding.
//!
//! # Data Flow
//! ```text
//! content-type header (or default from the route's schemas)
//!     → content_type.rs (media type, charset, boundary)
//!     → stream.rs (bounded read; stops at the size limit)
//!     → json.rs | urlencoded.rs | text.rs | multipart.rs
//!     → DecodedBody { payload, files }
//! ```
//!
//! # Design Decisions
//! - A declared `content-length` over the limit is rejected before reading
//! - `__proto__` keys never reach the decoded payload
//! - Unknown content types are rejected before the stream is touched

pub mod content_type;
pub mod cookies;
pub mod json;
pub mod multipart;
pub mod query;
pub mod stream;
pub mod text;
pub mod urlencoded;

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use serde_json::Value;

use crate::config::schema::RouteLimits;

pub use content_type::{parse_content_type, Charset, DecodeError, MediaType};
pub use cookies::parse_cookies;
pub use multipart::{MultipartError, MultipartForm, MultipartLimits, MultipartParser, UploadedFile};
pub use query::parse_query;

/// The decoded request body.
#[derive(Debug, Clone, Default)]
pub struct DecodedBody {
    pub payload: Value,
    pub files: HashMap<String, Vec<UploadedFile>>,
    /// Whether the payload came from a form encoding (all values are text).
    pub form_encoded: bool,
}

/// Content type assumed when the request declares none.
pub fn default_content_type(expects_files: bool) -> &'static str {
    if expects_files {
        content_type::MULTIPART_FORM_DATA
    } else {
        content_type::APPLICATION_JSON
    }
}

/// Decodes `body` according to the request's `content-type`.
pub async fn decode_body(
    body: Body,
    headers: &HeaderMap,
    expects_files: bool,
    limits: &RouteLimits,
) -> Result<DecodedBody, DecodeError> {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| default_content_type(expects_files));
    let media = parse_content_type(declared)?;
    if let MediaType::Other(essence) = media {
        return Err(DecodeError::Unsupported(essence));
    }

    let limit = limits.body.max_body_size;
    stream::check_content_length(headers, limit)?;
    let bytes = stream::read_limited(body, limit).await?;

    let decoded = match media {
        MediaType::Json(charset) => DecodedBody {
            payload: json::decode_json(&bytes, charset)?,
            ..DecodedBody::default()
        },
        MediaType::UrlEncoded(charset) => DecodedBody {
            payload: urlencoded::decode_urlencoded(&bytes, charset)?,
            form_encoded: true,
            ..DecodedBody::default()
        },
        MediaType::Text(charset) => DecodedBody {
            payload: text::decode_text(&bytes, charset)?,
            ..DecodedBody::default()
        },
        MediaType::Multipart { boundary } => {
            let form = MultipartParser::new(&boundary, MultipartLimits::from(limits)).parse(&bytes)?;
            DecodedBody {
                payload: Value::Object(form.fields),
                files: form.files,
                form_encoded: true,
            }
        }
        MediaType::Other(essence) => return Err(DecodeError::Unsupported(essence)),
    };
    tracing::trace!(bytes = bytes.len(), "Body decoded");
    Ok(decoded)
}
