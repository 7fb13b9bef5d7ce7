//! HTTP error taxonomy.
//!
//! Every failure inside the pipeline is converted into an [`HttpError`]
//! and from there into a [`Response`](crate::http::Response) before it
//! leaves the route handler.

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use crate::schema::SchemaIssue;

/// Where in the request a parameter was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Header,
    Cookie,
    UrlParam,
    QueryParam,
    File,
}

impl ParamLocation {
    fn noun(self) -> &'static str {
        match self {
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::UrlParam => "URL parameter",
            ParamLocation::QueryParam => "query parameter",
            ParamLocation::File => "file",
        }
    }

    fn short(self) -> &'static str {
        match self {
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::UrlParam => "URL",
            ParamLocation::QueryParam => "query",
            ParamLocation::File => "file",
        }
    }

    fn article(self) -> &'static str {
        match self {
            ParamLocation::UrlParam => "an",
            _ => "a",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::UrlParam => "url_param",
            ParamLocation::QueryParam => "query_param",
            ParamLocation::File => "file",
        }
    }
}

/// Structured description of a request that did not match its route schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The decoded body did not satisfy the body schema.
    Body { issues: Vec<SchemaIssue> },
    /// A declared key had no value at all.
    Missing { location: ParamLocation, key: String },
    /// A declared key had a value that failed validation.
    Invalid {
        location: ParamLocation,
        key: String,
        issues: Vec<SchemaIssue>,
    },
}

impl ValidationFailure {
    pub fn issues(&self) -> &[SchemaIssue] {
        match self {
            ValidationFailure::Body { issues } | ValidationFailure::Invalid { issues, .. } => issues,
            ValidationFailure::Missing { .. } => &[],
        }
    }

    pub fn location(&self) -> &'static str {
        match self {
            ValidationFailure::Body { .. } => "body",
            ValidationFailure::Missing { location, .. }
            | ValidationFailure::Invalid { location, .. } => location.as_str(),
        }
    }
}

fn write_issues(f: &mut fmt::Formatter<'_>, issues: &[SchemaIssue]) -> fmt::Result {
    for (i, issue) in issues.iter().enumerate() {
        if i > 0 {
            write!(f, ";")?;
        }
        write!(f, " {issue}")?;
    }
    Ok(())
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Body { issues } => {
                write!(f, "Incorrect body arguments!")?;
                write_issues(f, issues)
            }
            ValidationFailure::Missing { location, key } => write!(
                f,
                "This route expects {} {} named \"{}\" to be present!",
                location.article(),
                location.noun(),
                key
            ),
            ValidationFailure::Invalid {
                location,
                key,
                issues,
            } => {
                let article = if location.article() == "an" { "An" } else { "A" };
                write!(
                    f,
                    "{article} {} parameter could not be validated! \"{key}\":",
                    location.short()
                )?;
                write_issues(f, issues)
            }
        }
    }
}

/// Errors that terminate a request with an error response.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The request's content-type has no decoder.
    #[error("{0}")]
    NotAcceptable(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Validation(ValidationFailure),

    #[error("{0}")]
    Internal(String),

    /// Any other status chosen by user code.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

impl HttpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HttpError::Internal(message.into())
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        HttpError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) | HttpError::Validation(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            HttpError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Status { status, .. } => *status,
        }
    }

    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            HttpError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ValidationFailure> for HttpError {
    fn from(failure: ValidationFailure) -> Self {
        HttpError::Validation(failure)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::BadRequest(err.to_string())
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        HttpError::Internal(err.to_string())
    }
}
