//! The in-pipeline request value.
//!
//! # Responsibilities
//! - Carry identity (id, issue time) for tracing
//! - Hold raw headers merged with validated header values
//! - Hold parsed body, cookies, url params, query params and files
//! - Expose the request-scoped service scope (`provide`)
//!
//! # Design Decisions
//! - One value per inbound call; never shared across requests
//! - Parsed groups are `None` when the route declares no schema for them
//! - Request interceptors replace the value instead of mutating shared state

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use axum::http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::container::ServiceScope;
use crate::http::error::HttpError;
use crate::http::parse::UploadedFile;

/// A request flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    id: Uuid,
    issued_at: SystemTime,
    pub method: Method,
    pub url: Uri,
    /// Raw headers (lower-cased names) overlaid with validated values.
    pub headers: Map<String, Value>,
    pub body: Option<Value>,
    pub cookies: Option<Map<String, Value>>,
    pub url_params: Option<Map<String, Value>>,
    pub query_params: Option<Map<String, Value>>,
    pub files: Option<HashMap<String, Vec<UploadedFile>>>,
    /// Free-form data attached by interceptors and guards.
    pub metadata: Map<String, Value>,
    scope: Arc<ServiceScope>,
}

impl Request {
    /// Starts a request with a fresh identity and only its raw headers.
    pub fn new(method: Method, url: Uri, headers: &HeaderMap, scope: Arc<ServiceScope>) -> Self {
        Self {
            id: Uuid::new_v4(),
            issued_at: SystemTime::now(),
            method,
            url,
            headers: raw_headers(headers),
            body: None,
            cookies: None,
            url_params: None,
            query_params: None,
            files: None,
            metadata: Map::new(),
            scope,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    pub fn scope(&self) -> &Arc<ServiceScope> {
        &self.scope
    }

    /// Registers a service visible to the rest of this request only.
    pub fn provide<T: Any + Send + Sync>(&self, name: impl Into<String>, service: T) {
        self.scope.provide(name, Arc::new(service));
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// The header as text, if it holds a string.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(Value::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&Value> {
        self.cookies.as_ref().and_then(|c| c.get(name))
    }

    pub fn url_param(&self, name: &str) -> Option<&Value> {
        self.url_params.as_ref().and_then(|p| p.get(name))
    }

    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query_params.as_ref().and_then(|p| p.get(name))
    }

    /// Files uploaded under `name`; empty when there are none.
    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files
            .as_ref()
            .and_then(|f| f.get(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Deserializes the validated body.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| HttpError::bad_request("This route expects a request body!"))?;
        Ok(serde_json::from_value(body)?)
    }

    /// Deserializes the validated query parameters.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let query = self.query_params.clone().unwrap_or_default();
        Ok(serde_json::from_value(Value::Object(query))?)
    }

    /// `METHOD /path` for logs.
    pub fn signature(&self) -> String {
        format!("{} {}", self.method, self.url.path())
    }
}

fn raw_headers(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !values.is_empty() {
            out.insert(name.as_str().to_string(), Value::String(values.join(", ")));
        }
    }
    out
}
