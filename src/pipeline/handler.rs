//! The per-route pipeline orchestrator.
//!
//! # Data Flow
//! ```text
//! raw request + matched url params
//!     → forge            ── fail → data-validation-failed
//!     → request interceptors (in order)
//!                        ── Respond/Reject → interceptor-prevented-progression-with-{ok,error}-response
//!     → guards (in order) ── Deny/Respond/Reject → guard-prevented-progression
//!     → handler          → handler-finished-with-{ok,error}-response
//!     → response interceptors for the moment (+ parent, before-writing-to-client, always)
//!     → transport response
//! ```
//!
//! # Design Decisions
//! - Schemas, moment groups and limits are computed once, at construction
//! - Every request gets its own `ServiceScope`; nothing mutable is shared
//! - A failure in any stage becomes a `Response`; nothing escapes `handle`
//! - Panics in user code are caught at the stage boundary

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::config::RouteLimits;
use crate::container::{ResolveError, ServiceRegistry, ServiceScope, Services};
use crate::http::{HttpError, Request, Response};
use crate::observability::metrics::record_outcome;
use crate::pipeline::forge::forge_request;
use crate::pipeline::moment::{Moment, MomentTable};
use crate::pipeline::reply::{GuardVerdict, RequestFlow};
use crate::pipeline::ResponseInterceptor;
use crate::routing::Route;
use crate::schema::{compose, SchemaSet};

pub const UNAUTHORIZED_MESSAGE: &str = "You may not access this endpoint!";
pub const UNRESOLVED_MESSAGE: &str = "Missing/unresolved required service for this route";
const PANIC_MESSAGE: &str = "Internal server error";

/// Runs one route's pipeline for every request matched to it.
#[derive(Debug)]
pub struct RouteHandler {
    route: Arc<Route>,
    schemas: SchemaSet,
    moments: MomentTable,
    limits: RouteLimits,
    root: Arc<ServiceRegistry>,
    overrides: Option<Arc<ServiceRegistry>>,
    signature: String,
    invocations: AtomicU64,
}

impl RouteHandler {
    pub fn new(route: Route, root: Arc<ServiceRegistry>, defaults: &RouteLimits) -> Self {
        let schemas = {
            let contributed: Vec<&SchemaSet> = route
                .guards()
                .iter()
                .filter_map(|g| g.schemas())
                .chain(route.request_interceptors().iter().filter_map(|i| i.schemas()))
                .chain(route.response_interceptors().iter().filter_map(|i| i.schemas()))
                .collect();
            compose(route.schema_set(), &contributed)
        };
        let moments = MomentTable::build(
            route
                .response_interceptors()
                .iter()
                .map(ResponseInterceptor::moments),
        );
        let limits = defaults.merged(route.limits_override());
        let overrides = if route.registry().is_empty() {
            None
        } else {
            Some(Arc::new(route.registry().clone()))
        };

        Self {
            signature: route.signature(),
            route: Arc::new(route),
            schemas,
            moments,
            limits,
            root,
            overrides,
            invocations: AtomicU64::new(0),
        }
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// The route's schemas merged with guard and interceptor contributions.
    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    pub fn limits(&self) -> &RouteLimits {
        &self.limits
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Number of requests this route has processed.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Runs the pipeline and writes the transport response.
    pub async fn handle(
        &self,
        request: axum::http::Request<Body>,
        url_params: HashMap<String, String>,
    ) -> axum::response::Response {
        self.process(request, url_params).await.into_http()
    }

    /// Runs the pipeline, returning the final response before it is written.
    pub async fn process(
        &self,
        request: axum::http::Request<Body>,
        url_params: HashMap<String, String>,
    ) -> Response {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let span = tracing::debug_span!(
            "pipeline",
            route = %self.signature,
            request_id = tracing::field::Empty,
        );

        async move {
            let scope = Arc::new(ServiceScope::new(
                self.root.clone(),
                self.overrides.clone(),
            ));
            let (response, moment) = self.run_stages(request, &url_params, &scope).await;
            tracing::debug!(moment = %moment, status = response.status().as_u16(), "Pipeline finished");
            let response = self.dispatch(&scope, moment, response).await;
            record_outcome(
                &self.signature,
                response.status().as_u16(),
                moment.as_str(),
                started,
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        raw: axum::http::Request<Body>,
        url_params: &HashMap<String, String>,
        scope: &Arc<ServiceScope>,
    ) -> (Response, Moment) {
        let (parts, body) = raw.into_parts();
        let mut request = match forge_request(
            &parts,
            body,
            url_params,
            &self.schemas,
            &self.limits,
            scope.clone(),
        )
        .await
        {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "Request rejected while forging");
                return (Response::error(&err), Moment::DataValidationFailed);
            }
        };
        tracing::Span::current().record("request_id", tracing::field::display(request.id()));

        for interceptor in self.route.request_interceptors() {
            let services = match self.resolve(
                scope,
                "request interceptor",
                interceptor.name(),
                interceptor.required_services(),
            ) {
                Ok(services) => services,
                Err(response) => {
                    return (
                        response,
                        Moment::InterceptorPreventedProgressionWithErrorResponse,
                    )
                }
            };
            let flow = match self
                .catch_panic("request interceptor", interceptor.call(request, services))
                .await
            {
                Ok(flow) => flow,
                Err(response) => {
                    return (
                        response,
                        Moment::InterceptorPreventedProgressionWithErrorResponse,
                    )
                }
            };
            request = match flow {
                RequestFlow::Continue(next) => next,
                RequestFlow::Respond(response) => return interceptor_stop(response),
                RequestFlow::Reject(err) => return interceptor_stop(Response::error(&err)),
            };
        }

        for guard in self.route.guards() {
            let services = match self.resolve(
                scope,
                "guard",
                guard.name(),
                guard.required_services(),
            ) {
                Ok(services) => services,
                Err(response) => return (response, Moment::GuardPreventedProgression),
            };
            let verdict = match self
                .catch_panic(
                    "guard",
                    guard.call(request.clone(), self.route.clone(), services),
                )
                .await
            {
                Ok(verdict) => verdict,
                Err(response) => return (response, Moment::GuardPreventedProgression),
            };
            let rejection = match verdict {
                GuardVerdict::Allow => continue,
                GuardVerdict::Deny => Response::error(&HttpError::unauthorized(UNAUTHORIZED_MESSAGE)),
                GuardVerdict::Respond(response) => response,
                GuardVerdict::Reject(err) => Response::error(&err),
            };
            tracing::debug!(guard = guard.name(), status = rejection.status().as_u16(), "Guard rejected request");
            return (rejection, Moment::GuardPreventedProgression);
        }

        let services = match self.resolve(
            scope,
            "handler",
            "handler",
            self.route.required_services(),
        ) {
            Ok(services) => services,
            Err(response) => return (response, Moment::HandlerFinishedWithErrorResponse),
        };
        let handler = self.route.handler();
        let response = match self.catch_panic("handler", handler(request, services)).await {
            Ok(reply) => reply.into_response(),
            Err(response) => response,
        };
        let moment = if response.is_error() {
            Moment::HandlerFinishedWithErrorResponse
        } else {
            Moment::HandlerFinishedWithOkResponse
        };
        (response, moment)
    }

    async fn dispatch(
        &self,
        scope: &Arc<ServiceScope>,
        moment: Moment,
        mut response: Response,
    ) -> Response {
        let interceptors = self.route.response_interceptors();
        for index in self.moments.dispatch(moment) {
            let Some(interceptor) = interceptors.get(index) else {
                continue;
            };
            let services = match self.resolve(
                scope,
                "response interceptor",
                interceptor.name(),
                interceptor.required_services(),
            ) {
                Ok(services) => services,
                Err(failure) => return failure,
            };
            response = match self
                .catch_panic("response interceptor", interceptor.call(response, services))
                .await
            {
                Ok(next) => next,
                Err(failure) => return failure,
            };
        }
        response
    }

    fn resolve(
        &self,
        scope: &ServiceScope,
        stage: &'static str,
        owner: &str,
        names: &[String],
    ) -> Result<Services, Response> {
        scope.resolve_all(names).map_err(|err| {
            let missing = match &err {
                ResolveError::Unresolved { missing, .. } => missing.clone(),
                other => vec![other.to_string()],
            };
            tracing::error!(
                fatal = true,
                route = %self.signature,
                stage,
                owner,
                missing = ?missing,
                error = %err,
                "{UNRESOLVED_MESSAGE}"
            );
            Response::error(&HttpError::internal(UNRESOLVED_MESSAGE))
        })
    }

    async fn catch_panic<T>(
        &self,
        stage: &'static str,
        future: BoxFuture<'static, T>,
    ) -> Result<T, Response> {
        AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
            tracing::error!(
                route = %self.signature,
                stage,
                panic = %panic_message(panic.as_ref()),
                "Pipeline stage panicked"
            );
            Response::error(&HttpError::internal(PANIC_MESSAGE))
        })
    }
}

fn interceptor_stop(response: Response) -> (Response, Moment) {
    let moment = if response.is_error() {
        Moment::InterceptorPreventedProgressionWithErrorResponse
    } else {
        Moment::InterceptorPreventedProgressionWithOkResponse
    };
    (response, moment)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
