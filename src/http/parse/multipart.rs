//! `multipart/form-data` decoder.
//!
//! Boundary-delimited parsing per RFC 2046 over a fully buffered body.
//! Text parts become form fields; parts carrying a `filename` become
//! uploaded files, checked against the route's file limits.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::RouteLimits;
use crate::http::parse::json::POLLUTING_KEY;

/// Upper bound on the number of parts, files included.
pub const MAX_PARTS: usize = 1000;

const DEFAULT_FILE_MIME: &str = "application/octet-stream";

/// Limits enforced while parsing.
#[derive(Debug, Clone)]
pub struct MultipartLimits {
    pub max_total_size: usize,
    pub max_file_size: usize,
    pub min_file_size: usize,
    pub max_files: usize,
    pub accept_mimes: Vec<String>,
}

impl From<&RouteLimits> for MultipartLimits {
    fn from(limits: &RouteLimits) -> Self {
        Self {
            max_total_size: limits.body.max_body_size,
            max_file_size: limits.files.max_file_size,
            min_file_size: limits.files.minimum_file_size,
            max_files: limits.files.max_files,
            accept_mimes: limits.files.accept_mimes.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("file \"{filename}\" is too large: {size} bytes exceeds limit of {max}")]
    FileTooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    #[error("file \"{filename}\" is too small: {size} bytes is under the minimum of {min}")]
    FileTooSmall {
        filename: String,
        size: usize,
        min: usize,
    },

    #[error("total upload too large: {size} bytes exceeds limit of {max}")]
    TotalTooLarge { size: usize, max: usize },

    #[error("too many files: the limit is {max}")]
    TooManyFiles { max: usize },

    #[error("too many parts: the limit is {max}")]
    TooManyParts { max: usize },

    #[error("file \"{filename}\" has a rejected content type ({mime})")]
    MimeRejected { filename: String, mime: String },

    #[error("missing Content-Disposition header in part")]
    MissingContentDisposition,

    #[error("invalid Content-Disposition: {0}")]
    InvalidContentDisposition(&'static str),

    #[error("invalid part headers: {0}")]
    InvalidPartHeaders(&'static str),

    #[error("unexpected end of multipart data")]
    UnexpectedEof,

    #[error("invalid multipart format: {0}")]
    InvalidFormat(&'static str),
}

impl MultipartError {
    /// Whether the error is a size/count limit rather than malformed input.
    pub fn is_size_limit(&self) -> bool {
        matches!(
            self,
            MultipartError::FileTooLarge { .. }
                | MultipartError::TotalTooLarge { .. }
                | MultipartError::TooManyFiles { .. }
                | MultipartError::TooManyParts { .. }
        )
    }
}

/// A file received in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn extension(&self) -> Option<&str> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

/// Decoded multipart body: text fields plus files grouped by field name.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub fields: Map<String, Value>,
    pub files: HashMap<String, Vec<UploadedFile>>,
}

/// Whether `mime` is accepted by `pattern` (`*/*`, `type/*` or exact).
pub fn mime_matches(pattern: &str, mime: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    let mime = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if pattern == "*/*" || pattern == "*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(kind) => mime
            .split_once('/')
            .is_some_and(|(mime_kind, _)| mime_kind == kind),
        None => pattern == mime,
    }
}

/// Boundary-based parser.
#[derive(Debug)]
pub struct MultipartParser {
    boundary: Vec<u8>,
    /// `CRLF--boundary`, the only thing that ends a part.
    delimiter: Vec<u8>,
    limits: MultipartLimits,
}

impl MultipartParser {
    pub fn new(boundary: &str, limits: MultipartLimits) -> Self {
        Self {
            boundary: format!("--{boundary}").into_bytes(),
            delimiter: format!("\r\n--{boundary}").into_bytes(),
            limits,
        }
    }

    pub fn parse(&self, body: &[u8]) -> Result<MultipartForm, MultipartError> {
        let mut form = MultipartForm::default();
        let mut parts = 0usize;
        let mut file_count = 0usize;
        let mut total_size = 0usize;

        // Skip the preamble.
        let mut pos = self.find_boundary_from(body, 0)?;

        loop {
            let boundary_end = pos + self.boundary.len();
            if body.get(boundary_end..boundary_end + 2) == Some(b"--".as_slice()) {
                break;
            }
            if parts >= MAX_PARTS {
                return Err(MultipartError::TooManyParts { max: MAX_PARTS });
            }

            pos = boundary_end;
            match body.get(pos..pos + 2) {
                None => return Err(MultipartError::UnexpectedEof),
                Some(b"\r\n") => pos += 2,
                Some(_) => return Err(MultipartError::InvalidFormat("expected CRLF after boundary")),
            }

            let (headers, header_end) = parse_part_headers(body, pos)?;
            pos = header_end;

            let disposition = headers
                .get("content-disposition")
                .ok_or(MultipartError::MissingContentDisposition)?;
            let (name, filename) = parse_content_disposition(disposition)?;

            let data_end = find_from(body, pos, &self.delimiter)?;
            let data = &body[pos..data_end];

            total_size += data.len();
            if total_size > self.limits.max_total_size {
                return Err(MultipartError::TotalTooLarge {
                    size: total_size,
                    max: self.limits.max_total_size,
                });
            }

            match filename {
                Some(filename) => {
                    let content_type = headers
                        .get("content-type")
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_FILE_MIME.to_string());
                    self.check_file(&filename, &content_type, data.len())?;
                    file_count += 1;
                    if file_count > self.limits.max_files {
                        return Err(MultipartError::TooManyFiles {
                            max: self.limits.max_files,
                        });
                    }
                    form.files.entry(name.clone()).or_default().push(UploadedFile {
                        field_name: name,
                        filename,
                        content_type,
                        data: Bytes::copy_from_slice(data),
                    });
                }
                None if name == POLLUTING_KEY => {}
                None => {
                    let text = String::from_utf8_lossy(data).into_owned();
                    insert_field(&mut form.fields, name, text);
                }
            }

            parts += 1;
            pos = data_end + 2;
        }

        Ok(form)
    }

    fn check_file(&self, filename: &str, mime: &str, size: usize) -> Result<(), MultipartError> {
        if size > self.limits.max_file_size {
            return Err(MultipartError::FileTooLarge {
                filename: filename.to_string(),
                size,
                max: self.limits.max_file_size,
            });
        }
        // Empty files are never accepted.
        let min = self.limits.min_file_size.max(1);
        if size < min {
            return Err(MultipartError::FileTooSmall {
                filename: filename.to_string(),
                size,
                min,
            });
        }
        if !self
            .limits
            .accept_mimes
            .iter()
            .any(|pattern| mime_matches(pattern, mime))
        {
            return Err(MultipartError::MimeRejected {
                filename: filename.to_string(),
                mime: mime.to_string(),
            });
        }
        Ok(())
    }

    fn find_boundary_from(&self, data: &[u8], start: usize) -> Result<usize, MultipartError> {
        find_from(data, start, &self.boundary)
    }
}

fn find_from(data: &[u8], start: usize, needle: &[u8]) -> Result<usize, MultipartError> {
    if data.len() < needle.len() || start > data.len() - needle.len() {
        return Err(MultipartError::UnexpectedEof);
    }
    data[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| start + offset)
        .ok_or(MultipartError::UnexpectedEof)
}

/// Repeated field names collect into an array.
fn insert_field(fields: &mut Map<String, Value>, name: String, text: String) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(Value::String(text)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(text)]);
        }
        None => {
            fields.insert(name, Value::String(text));
        }
    }
}

fn parse_part_headers(
    data: &[u8],
    start: usize,
) -> Result<(HashMap<String, String>, usize), MultipartError> {
    let mut headers = HashMap::new();
    let mut pos = start;

    loop {
        let line_end = find_crlf(data, pos)?;
        let line = &data[pos..line_end];
        if line.is_empty() {
            return Ok((headers, line_end + 2));
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| MultipartError::InvalidPartHeaders("invalid UTF-8 in header"))?;
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        pos = line_end + 2;
    }
}

fn find_crlf(data: &[u8], start: usize) -> Result<usize, MultipartError> {
    data.get(start..)
        .and_then(|rest| rest.windows(2).position(|w| w == b"\r\n"))
        .map(|offset| start + offset)
        .ok_or(MultipartError::UnexpectedEof)
}

/// Parses `form-data; name="field"; filename="file.txt"`.
fn parse_content_disposition(value: &str) -> Result<(String, Option<String>), MultipartError> {
    let mut name = None;
    let mut filename = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(unquote(raw)),
            "filename" => {
                let unquoted = unquote(raw);
                if unquoted.contains("..")
                    || unquoted.contains('/')
                    || unquoted.contains('\\')
                    || unquoted.contains('\0')
                {
                    return Err(MultipartError::InvalidContentDisposition(
                        "filename contains path traversal characters",
                    ));
                }
                filename = Some(unquoted);
            }
            _ => {}
        }
    }

    let name = name.ok_or(MultipartError::InvalidContentDisposition(
        "missing name parameter",
    ))?;
    Ok((name, filename))
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MultipartLimits {
        MultipartLimits {
            max_total_size: 1024,
            max_file_size: 64,
            min_file_size: 1,
            max_files: 2,
            accept_mimes: vec!["text/*".into(), "image/png".into()],
        }
    }

    fn body(parts: &[(&str, Option<(&str, &str)>, &str)]) -> Vec<u8> {
        let mut out = String::from("preamble\r\n");
        for (name, file, data) in parts {
            out.push_str("--XyZ\r\n");
            match file {
                Some((filename, mime)) => out.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
                )),
                None => out.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            out.push_str(data);
            out.push_str("\r\n");
        }
        out.push_str("--XyZ--\r\n");
        out.into_bytes()
    }

    #[test]
    fn test_boundary_text_inside_part_is_kept() {
        let raw = body(&[
            ("note", None, "see --XyZ here"),
            ("doc", Some(("a.txt", "text/plain")), "x--XyZy"),
        ]);
        let form = MultipartParser::new("XyZ", limits()).parse(&raw).unwrap();
        assert_eq!(form.fields["note"], "see --XyZ here");
        assert_eq!(form.files["doc"][0].data.as_ref(), b"x--XyZy");
    }

    #[test]
    fn test_fields_and_files_are_separated() {
        let raw = body(&[
            ("title", None, "hello"),
            ("tag", None, "a"),
            ("tag", None, "b"),
            ("doc", Some(("notes.txt", "text/plain")), "line one\r\nline two"),
        ]);
        let form = MultipartParser::new("XyZ", limits()).parse(&raw).unwrap();

        assert_eq!(form.fields["title"], "hello");
        assert_eq!(form.fields["tag"], serde_json::json!(["a", "b"]));
        let doc = &form.files["doc"][0];
        assert_eq!(doc.filename, "notes.txt");
        assert_eq!(doc.extension(), Some("txt"));
        assert_eq!(&doc.data[..], b"line one\r\nline two");
    }

    #[test]
    fn test_file_limits() {
        let parser = MultipartParser::new("XyZ", limits());

        let big = "x".repeat(65);
        let err = parser
            .parse(&body(&[("f", Some(("a.txt", "text/plain")), &big)]))
            .unwrap_err();
        assert!(matches!(err, MultipartError::FileTooLarge { size: 65, .. }));
        assert!(err.is_size_limit());

        let err = parser
            .parse(&body(&[("f", Some(("a.txt", "text/plain")), "")]))
            .unwrap_err();
        assert!(matches!(err, MultipartError::FileTooSmall { .. }));

        let err = parser
            .parse(&body(&[("f", Some(("a.gif", "image/gif")), "GIF")]))
            .unwrap_err();
        assert!(matches!(err, MultipartError::MimeRejected { .. }));

        let err = parser
            .parse(&body(&[
                ("f", Some(("1.txt", "text/plain")), "1"),
                ("f", Some(("2.txt", "text/plain")), "2"),
                ("f", Some(("3.txt", "text/plain")), "3"),
            ]))
            .unwrap_err();
        assert!(matches!(err, MultipartError::TooManyFiles { max: 2 }));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let err = MultipartParser::new("XyZ", limits())
            .parse(&body(&[("f", Some(("../etc/passwd", "text/plain")), "x")]))
            .unwrap_err();
        assert!(matches!(err, MultipartError::InvalidContentDisposition(_)));
    }

    #[test]
    fn test_truncated_body() {
        let err = MultipartParser::new("XyZ", limits())
            .parse(b"--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nno end")
            .unwrap_err();
        assert!(matches!(err, MultipartError::UnexpectedEof));
    }

    #[test]
    fn test_mime_patterns() {
        assert!(mime_matches("*/*", "application/pdf"));
        assert!(mime_matches("image/*", "image/png"));
        assert!(mime_matches("text/plain", "Text/Plain; charset=utf-8"));
        assert!(!mime_matches("image/*", "text/plain"));
    }
}
