//! Outcomes returned by handlers, guards and request interceptors.

use serde_json::Value;

use crate::http::{HttpError, Request, Response};

/// What a route handler produced.
#[derive(Debug, Clone)]
pub enum Reply {
    Response(Response),
    Error(HttpError),
    /// A plain value; sent as a 200 JSON payload.
    Payload(Value),
}

impl Reply {
    pub fn into_response(self) -> Response {
        match self {
            Reply::Response(response) => response,
            Reply::Error(err) => Response::error(&err),
            Reply::Payload(value) => Response::ok(value),
        }
    }
}

/// Conversion of handler return values into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Reply {
        Reply::Response(self)
    }
}

impl IntoReply for HttpError {
    fn into_reply(self) -> Reply {
        Reply::Error(self)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Reply {
        Reply::Payload(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply {
        Reply::Payload(Value::String(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply {
        Reply::Payload(Value::String(self.to_string()))
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply {
        Reply::Payload(Value::Null)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<HttpError>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Reply::Error(err.into()),
        }
    }
}

/// A guard's decision.
#[derive(Debug, Clone)]
pub enum GuardVerdict {
    Allow,
    /// Rejected with the generic 401.
    Deny,
    /// Rejected with this exact response.
    Respond(Response),
    Reject(HttpError),
}

impl From<bool> for GuardVerdict {
    fn from(allowed: bool) -> Self {
        if allowed {
            GuardVerdict::Allow
        } else {
            GuardVerdict::Deny
        }
    }
}

impl From<Response> for GuardVerdict {
    fn from(response: Response) -> Self {
        GuardVerdict::Respond(response)
    }
}

impl From<HttpError> for GuardVerdict {
    fn from(err: HttpError) -> Self {
        GuardVerdict::Reject(err)
    }
}

impl From<Result<bool, HttpError>> for GuardVerdict {
    fn from(result: Result<bool, HttpError>) -> Self {
        match result {
            Ok(allowed) => allowed.into(),
            Err(err) => GuardVerdict::Reject(err),
        }
    }
}

/// A request interceptor's decision.
#[derive(Debug, Clone)]
pub enum RequestFlow {
    /// Carry on with this (possibly replaced) request.
    Continue(Request),
    Respond(Response),
    Reject(HttpError),
}

impl From<Request> for RequestFlow {
    fn from(request: Request) -> Self {
        RequestFlow::Continue(request)
    }
}

impl From<Response> for RequestFlow {
    fn from(response: Response) -> Self {
        RequestFlow::Respond(response)
    }
}

impl From<HttpError> for RequestFlow {
    fn from(err: HttpError) -> Self {
        RequestFlow::Reject(err)
    }
}

impl From<Result<Request, HttpError>> for RequestFlow {
    fn from(result: Result<Request, HttpError>) -> Self {
        match result {
            Ok(request) => RequestFlow::Continue(request),
            Err(err) => RequestFlow::Reject(err),
        }
    }
}
