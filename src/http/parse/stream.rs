//! Bounded body accumulation.

use axum::body::Body;
use axum::http::{header, HeaderMap};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::http::parse::content_type::DecodeError;

/// Rejects up front when a declared `content-length` is already over `limit`.
pub fn check_content_length(headers: &HeaderMap, limit: usize) -> Result<(), DecodeError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    match declared {
        Some(len) if len > limit as u64 => Err(DecodeError::TooLarge { limit }),
        _ => Ok(()),
    }
}

/// Reads the whole body, stopping as soon as more than `limit` bytes arrive.
///
/// The remaining stream is dropped unread when the limit trips.
pub async fn read_limited(body: Body, limit: usize) -> Result<Bytes, DecodeError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DecodeError::Stream(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            tracing::debug!(limit, received = buf.len() + chunk.len(), "Body exceeds limit");
            return Err(DecodeError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
