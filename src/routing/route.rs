//! Route definitions.
//!
//! # Responsibilities
//! - Describe one endpoint: methods, URL pattern, schemas, guards,
//!   interceptors, service overrides and the handler
//! - Offer a builder used by application code and controllers
//!
//! # Design Decisions
//! - GET when no method is given; a leading `/` is always present
//! - Immutable once a server holds it (shared through `Arc`)
//! - The handler's services are declared by name, never inferred

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::config::RouteLimitsOverride;
use crate::container::{ServiceProvider, ServiceRegistry, Services};
use crate::http::Request;
use crate::pipeline::interceptor::names;
use crate::pipeline::{Guard, IntoReply, Reply, RequestInterceptor, ResponseInterceptor};
use crate::routing::pattern;
use crate::schema::{FileRule, ObjectSchema, Schema, SchemaSet};

pub type HandlerFn = Arc<dyn Fn(Request, Services) -> BoxFuture<'static, Reply> + Send + Sync>;

/// One endpoint.
#[derive(Clone)]
pub struct Route {
    methods: Vec<Method>,
    url: String,
    schemas: SchemaSet,
    guards: Vec<Guard>,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
    handler: HandlerFn,
    requires: Vec<String>,
    register: ServiceRegistry,
    limits: RouteLimitsOverride,
}

impl Route {
    pub fn new<F, Fut, R>(url: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Request, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            methods: Vec::new(),
            url: pattern::normalize(url.as_ref()),
            schemas: SchemaSet::default(),
            guards: Vec::new(),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            // Deferred into the future so a panic in the closure body is caught
            // at the handler stage.
            handler: Arc::new(move |request, services| {
                let handler = handler.clone();
                async move { handler(request, services).await.into_reply() }.boxed()
            }),
            requires: Vec::new(),
            register: ServiceRegistry::new(),
            limits: RouteLimitsOverride::default(),
        }
    }

    /// Adds an accepted method.
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    pub fn methods<I: IntoIterator<Item = Method>>(self, methods: I) -> Self {
        methods.into_iter().fold(self, Route::method)
    }

    pub fn body(mut self, schema: ObjectSchema) -> Self {
        self.schemas = self.schemas.body(schema);
        self
    }

    pub fn header(mut self, name: &str, schema: impl Into<Schema>) -> Self {
        self.schemas = self.schemas.header(name, schema);
        self
    }

    pub fn cookie(mut self, name: &str, schema: impl Into<Schema>) -> Self {
        self.schemas = self.schemas.cookie(name, schema);
        self
    }

    pub fn url_param(mut self, name: &str, schema: impl Into<Schema>) -> Self {
        self.schemas = self.schemas.url_param(name, schema);
        self
    }

    pub fn query_param(mut self, name: &str, schema: impl Into<Schema>) -> Self {
        self.schemas = self.schemas.query_param(name, schema);
        self
    }

    pub fn file(mut self, name: &str, rule: FileRule) -> Self {
        self.schemas = self.schemas.file(name, rule);
        self
    }

    /// Merges a whole schema set; keys already declared on the route win.
    pub fn schemas(mut self, schemas: &SchemaSet) -> Self {
        self.schemas.absorb_outer(schemas);
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn intercept_request(mut self, interceptor: RequestInterceptor) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn intercept_response(mut self, interceptor: ResponseInterceptor) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    /// Overrides a service for this route only.
    pub fn register(mut self, name: impl Into<String>, provider: ServiceProvider) -> Self {
        self.register.register(name, provider);
        self
    }

    pub fn limits(mut self, limits: RouteLimitsOverride) -> Self {
        self.limits = limits;
        self
    }

    /// Declares the services handed to the handler, in order.
    pub fn requires<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = names(services);
        self
    }

    /// Accepted methods; GET when none were given.
    pub fn accepted_methods(&self) -> Vec<Method> {
        if self.methods.is_empty() {
            vec![Method::GET]
        } else {
            self.methods.clone()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn schema_set(&self) -> &SchemaSet {
        &self.schemas
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn request_interceptors(&self) -> &[RequestInterceptor] {
        &self.request_interceptors
    }

    pub fn response_interceptors(&self) -> &[ResponseInterceptor] {
        &self.response_interceptors
    }

    pub fn required_services(&self) -> &[String] {
        &self.requires
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.register
    }

    pub fn limits_override(&self) -> &RouteLimitsOverride {
        &self.limits
    }

    pub(crate) fn handler(&self) -> &HandlerFn {
        &self.handler
    }

    /// `GET|POST /url`, used in logs and metrics.
    pub fn signature(&self) -> String {
        let methods: Vec<String> = self
            .accepted_methods()
            .iter()
            .map(|m| m.as_str().to_string())
            .collect();
        format!("{} {}", methods.join("|"), self.url)
    }

    // Controllers prepend their contributions so they run first.
    pub(crate) fn prepend(
        &mut self,
        guards: &[Guard],
        request_interceptors: &[RequestInterceptor],
        response_interceptors: &[ResponseInterceptor],
    ) {
        self.guards.splice(0..0, guards.iter().cloned());
        self.request_interceptors
            .splice(0..0, request_interceptors.iter().cloned());
        self.response_interceptors
            .splice(0..0, response_interceptors.iter().cloned());
    }

    pub(crate) fn absorb_outer(
        &mut self,
        schemas: &SchemaSet,
        register: &ServiceRegistry,
        limits: &RouteLimitsOverride,
    ) {
        self.schemas.absorb_outer(schemas);
        self.register.absorb_outer(register);
        self.limits.absorb_outer(limits);
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.accepted_methods())
            .field("url", &self.url)
            .field("schemas", &self.schemas)
            .field("guards", &self.guards)
            .field("request_interceptors", &self.request_interceptors)
            .field("response_interceptors", &self.response_interceptors)
            .field("requires", &self.requires)
            .finish()
    }
}
