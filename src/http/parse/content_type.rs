//! `content-type` negotiation and charset handling.

use thiserror::Error;

use crate::http::error::HttpError;
use crate::http::parse::multipart::MultipartError;

pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const TEXT_PLAIN: &str = "text/plain";

/// Errors raised while turning a request body into a payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("multipart/form-data requires that the 'boundary' parameter in content-type header to be set, none found!")]
    MissingBoundary,

    #[error("The content-type provided ({0}) is not supported by this server!")]
    Unsupported(String),

    #[error("Request payload is bigger than {limit}")]
    TooLarge { limit: usize },

    #[error("Could not read the request body: {0}")]
    Stream(String),

    #[error("Could not parse the payload as JSON content!")]
    InvalidJson(#[source] serde_json::Error),

    #[error("The payload is not valid {charset} text!")]
    Charset { charset: &'static str },

    #[error(transparent)]
    Multipart(#[from] MultipartError),
}

impl From<DecodeError> for HttpError {
    fn from(err: DecodeError) -> Self {
        match &err {
            DecodeError::Unsupported(_) => HttpError::NotAcceptable(err.to_string()),
            DecodeError::TooLarge { .. } => HttpError::PayloadTooLarge(err.to_string()),
            DecodeError::Multipart(inner) if inner.is_size_limit() => {
                HttpError::PayloadTooLarge(err.to_string())
            }
            _ => HttpError::BadRequest(err.to_string()),
        }
    }
}

/// Text encodings a body may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    /// Raw bytes; no transcoding happens before parsing.
    Binary,
}

impl Charset {
    /// Unknown labels fall back to UTF-8.
    pub fn from_label(label: &str) -> Charset {
        match label.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Charset::Ascii,
            "latin1" | "iso-8859-1" => Charset::Latin1,
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Charset::Utf16Le,
            "binary" => Charset::Binary,
            _ => Charset::Utf8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Ascii => "us-ascii",
            Charset::Latin1 => "latin1",
            Charset::Utf16Le => "utf-16le",
            Charset::Binary => "binary",
        }
    }

    /// Decodes `bytes` into text. `Binary` maps each byte to one char.
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeError> {
        let invalid = || DecodeError::Charset {
            charset: self.as_str(),
        };
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| invalid()),
            Charset::Ascii => {
                if bytes.is_ascii() {
                    String::from_utf8(bytes.to_vec()).map_err(|_| invalid())
                } else {
                    Err(invalid())
                }
            }
            Charset::Latin1 | Charset::Binary => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| invalid())
            }
        }
    }
}

/// A negotiated body media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Json(Charset),
    UrlEncoded(Charset),
    Text(Charset),
    Multipart { boundary: String },
    /// No decoder exists for this type.
    Other(String),
}

/// Parses a `content-type` header value.
///
/// Media type and parameter names are matched case-insensitively; the
/// boundary keeps its case. Without parameters each known type gets its
/// registered default charset. `multipart/form-data` without a boundary is
/// rejected.
pub fn parse_content_type(raw: &str) -> Result<MediaType, DecodeError> {
    let mut segments = raw.split(';');
    let essence = segments
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let mut charset = None;
    let mut boundary = None;
    let mut has_params = false;
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        has_params = true;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "charset" => charset = Some(Charset::from_label(value)),
            "boundary" => {
                let value = value.trim_matches('"');
                if !value.is_empty() {
                    boundary = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    // Parameters without a charset mean utf-8; no parameters at all means
    // the media type's own default.
    let resolve = |default: Charset| match (charset, has_params) {
        (Some(charset), _) => charset,
        (None, true) => Charset::Utf8,
        (None, false) => default,
    };

    match essence.as_str() {
        APPLICATION_JSON => Ok(MediaType::Json(resolve(Charset::Binary))),
        FORM_URLENCODED => Ok(MediaType::UrlEncoded(resolve(Charset::Utf8))),
        TEXT_PLAIN => Ok(MediaType::Text(resolve(Charset::Utf8))),
        MULTIPART_FORM_DATA => boundary
            .map(|boundary| MediaType::Multipart { boundary })
            .ok_or(DecodeError::MissingBoundary),
        _ => Ok(MediaType::Other(essence)),
    }
}
