//! HTTP server setup.
//!
//! # Responsibilities
//! - Hold the process-wide service registry and the registered routes
//! - Build the Axum router: one method route per (path, method), each
//!   delegating to its route's `RouteHandler`
//! - Wire up middleware (tracing, timeout) and the 404 fallback
//! - Bind to a listener and shut down gracefully on Ctrl-C

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::extract::RawPathParams;
use axum::http::Method;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::HttpConfig;
use crate::container::ServiceRegistry;
use crate::http::{HttpError, Response};
use crate::pipeline::RouteHandler;
use crate::routing::{to_router_paths, Route};

/// Serves registered routes through the request pipeline.
pub struct HttpServer {
    config: HttpConfig,
    registry: Arc<ServiceRegistry>,
    handlers: Vec<Arc<RouteHandler>>,
}

impl HttpServer {
    /// Create a server with an empty service registry.
    pub fn new(config: HttpConfig) -> Self {
        Self::with_services(config, ServiceRegistry::new())
    }

    /// Create a server whose routes resolve services from `registry`.
    pub fn with_services(config: HttpConfig, registry: ServiceRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            handlers: Vec::new(),
        }
    }

    /// Registers a fully composed route.
    pub fn add_route(&mut self, route: Route) -> &mut Self {
        let guards: Vec<&str> = route.guards().iter().map(|g| g.name()).collect();
        let request_interceptors: Vec<&str> =
            route.request_interceptors().iter().map(|i| i.name()).collect();
        let response_interceptors: Vec<&str> =
            route.response_interceptors().iter().map(|i| i.name()).collect();
        tracing::info!(
            methods = ?route.accepted_methods(),
            url = %route.url(),
            guards = ?guards,
            request_interceptors = ?request_interceptors,
            response_interceptors = ?response_interceptors,
            "Route added"
        );

        let handler = RouteHandler::new(route, self.registry.clone(), &self.config.route);
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.handlers.iter().map(|h| h.route().as_ref())
    }

    pub fn handlers(&self) -> &[Arc<RouteHandler>] {
        &self.handlers
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let mut paths: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut shapes: HashMap<String, String> = HashMap::new();
        let mut taken: HashSet<(String, Method)> = HashSet::new();

        for handler in &self.handlers {
            for path in to_router_paths(handler.route().url()) {
                let shape = path_shape(&path);
                match shapes.get(&shape) {
                    Some(existing) if *existing != path => {
                        tracing::warn!(
                            route = %handler.signature(),
                            path = %path,
                            conflicts_with = %existing,
                            "Skipping path that conflicts with an earlier route"
                        );
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        shapes.insert(shape, path.clone());
                    }
                }

                for method in handler.route().accepted_methods() {
                    if !taken.insert((path.clone(), method.clone())) {
                        tracing::warn!(
                            route = %handler.signature(),
                            path = %path,
                            "Duplicate route ignored; the first registration wins"
                        );
                        continue;
                    }
                    let filter = match MethodFilter::try_from(method.clone()) {
                        Ok(filter) => filter,
                        Err(_) => {
                            tracing::warn!(method = %method, path = %path, "Unsupported method");
                            continue;
                        }
                    };
                    let handler = handler.clone();
                    let endpoint = move |params: RawPathParams, request: axum::extract::Request| async move {
                        let url_params: HashMap<String, String> = params
                            .iter()
                            .map(|(key, value)| (key.to_string(), value.to_string()))
                            .collect();
                        handler.handle(request, url_params).await
                    };
                    let methods = paths.remove(&path).unwrap_or_else(MethodRouter::new);
                    paths.insert(path.clone(), methods.on(filter, endpoint));
                }
            }
        }

        let not_found = self.config.server.not_found_message.clone();
        let mut router = paths
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| router.route(&path, methods))
            .fallback(move || {
                let message = not_found.clone();
                async move { Response::error(&HttpError::NotFound(message)).into_http() }
            });

        if let Some(timeout) = self.config.server.request_timeout() {
            router = router.layer(TimeoutLayer::new(timeout));
        }
        router.layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.handlers.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// `/a/{x}` and `/a/{y}` share a shape; the router cannot hold both.
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
