//! Controllers: shared configuration applied to a group of routes.
//!
//! A controller carries the same guards, interceptors, schemas, service
//! overrides and limits a route does. Applying it prepends the list
//! items (so they run before the route's own) and fills map-like settings
//! only where the route left gaps.

use crate::config::RouteLimitsOverride;
use crate::container::{ServiceProvider, ServiceRegistry};
use crate::pipeline::{Guard, RequestInterceptor, ResponseInterceptor};
use crate::routing::Route;
use crate::schema::{FileRule, ObjectSchema, Schema, SchemaSet};

#[derive(Debug, Clone, Default)]
pub struct Controller {
    name: String,
    schemas: SchemaSet,
    guards: Vec<Guard>,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
    register: ServiceRegistry,
    limits: RouteLimitsOverride,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub fn register(mut self, name: impl Into<String>, provider: ServiceProvider) -> Self {
        self.register.register(name, provider);
        self
    }

    pub fn limits(mut self, limits: RouteLimitsOverride) -> Self {
        self.limits = limits;
        self
    }

    /// Applies this controller to `route` as an outer scope.
    pub fn apply_to(&self, route: &mut Route) {
        route.prepend(
            &self.guards,
            &self.request_interceptors,
            &self.response_interceptors,
        );
        route.absorb_outer(&self.schemas, &self.register, &self.limits);
    }
}

/// Applies `controllers`, ordered outermost first, to `route`.
pub fn apply_controllers(mut route: Route, controllers: &[Controller]) -> Route {
    // innermost first so the outermost ends up at the front
    for controller in controllers.iter().rev() {
        controller.apply_to(&mut route);
    }
    route
}
