//! Response value produced by the pipeline.
//!
//! # Responsibilities
//! - Carry status, payload, headers and cookies through response interceptors
//! - Translate [`HttpError`]s into JSON error payloads
//! - Convert into the transport's response exactly once (`into_http`)
//!
//! # Design Decisions
//! - JSON is the default payload encoding
//! - A `content-type` set by user code is never overwritten

use std::fmt;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::http::error::HttpError;

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// A cookie to set on the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        match self.same_site {
            Some(SameSite::Strict) => write!(f, "; SameSite=Strict")?,
            Some(SameSite::Lax) => write!(f, "; SameSite=Lax")?,
            Some(SameSite::None) => write!(f, "; SameSite=None")?,
            None => {}
        }
        Ok(())
    }
}

/// An HTTP response flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    body: ResponseBody,
    headers: HeaderMap,
    cookies: Vec<SetCookie>,
}

impl Response {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self {
            status,
            body,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
        }
    }

    /// 200 with a JSON payload.
    pub fn ok(payload: impl Into<Value>) -> Self {
        Self::json(StatusCode::OK, payload)
    }

    pub fn json(status: StatusCode, payload: impl Into<Value>) -> Self {
        Self::new(status, ResponseBody::Json(payload.into()))
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status, ResponseBody::Text(text.into()))
    }

    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, ResponseBody::Empty)
    }

    /// Translates an error into a JSON error response.
    pub fn error(err: &HttpError) -> Self {
        let status = err.status();
        let mut payload = json!({
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": err.to_string(),
        });
        if let Some(failure) = err.validation() {
            payload["location"] = Value::from(failure.location());
            let issues: Vec<Value> = failure
                .issues()
                .iter()
                .map(|issue| json!({ "path": issue.path, "message": issue.message }))
                .collect();
            if !issues.is_empty() {
                payload["issues"] = Value::Array(issues);
            }
        }
        Self::json(status, payload)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: ResponseBody) {
        self.body = body;
    }

    /// The JSON payload, if this response carries one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header; invalid names or values are dropped with a warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
        self
    }

    pub fn with_cookie(mut self, cookie: SetCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn cookies(&self) -> &[SetCookie] {
        &self.cookies
    }

    /// Writes status, headers, cookies and body into a transport response.
    pub fn into_http(self) -> axum::response::Response {
        let Response {
            status,
            body,
            mut headers,
            cookies,
        } = self;

        for cookie in &cookies {
            match HeaderValue::try_from(cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(_) => tracing::warn!(cookie = %cookie.name, "Dropping invalid cookie"),
            }
        }

        let (default_type, bytes) = match body {
            ResponseBody::Empty => (None, Bytes::new()),
            ResponseBody::Json(value) => (
                Some("application/json"),
                Bytes::from(serde_json::to_vec(&value).unwrap_or_default()),
            ),
            ResponseBody::Text(text) => (Some("text/plain; charset=utf-8"), Bytes::from(text)),
            ResponseBody::Bytes(bytes) => (Some("application/octet-stream"), bytes),
        };
        if let Some(content_type) = default_type {
            headers
                .entry(header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(content_type));
        }

        let mut response = axum::response::Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl From<HttpError> for Response {
    fn from(err: HttpError) -> Self {
        Response::error(&err)
    }
}
