//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use request_pipeline::{HttpConfig, HttpServer, Route, ServiceRegistry};

/// A response collected from an in-process router.
pub struct Collected {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Builds a router serving `routes` with default configuration.
pub fn router_for(routes: Vec<Route>, registry: ServiceRegistry) -> Router {
    let mut server = HttpServer::with_services(HttpConfig::default(), registry);
    for route in routes {
        server.add_route(route);
    }
    server.router()
}

/// Sends one request through `router` and decodes the JSON body (Null if empty).
pub async fn send(router: Router, request: Request<Body>) -> Collected {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Collected {
        status,
        headers,
        body,
    }
}

pub fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Ordered log shared between interceptors, guards and handlers.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Starts `server` on an ephemeral port and returns its address.
pub async fn start_server(server: HttpServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    addr
}
