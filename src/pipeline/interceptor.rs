//! Request and response interceptors.
//!
//! Both kinds are a tagged variant: a bare function, or a named value that
//! can also carry schemas (and, for response interceptors, the moments it
//! runs at). Required services are always declared up front by name.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::container::Services;
use crate::http::{Request, Response};
use crate::pipeline::moment::Moment;
use crate::pipeline::reply::RequestFlow;
use crate::schema::SchemaSet;

pub(crate) const ANONYMOUS: &str = "anonymous";

pub type RequestInterceptFn =
    Arc<dyn Fn(Request, Services) -> BoxFuture<'static, RequestFlow> + Send + Sync>;

pub type ResponseInterceptFn =
    Arc<dyn Fn(Response, Services) -> BoxFuture<'static, Response> + Send + Sync>;

pub(crate) fn names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// Runs before guards; may replace the request or end the pipeline.
#[derive(Clone)]
pub enum RequestInterceptor {
    Function {
        intercept: RequestInterceptFn,
        requires: Vec<String>,
    },
    Named {
        name: String,
        intercept: RequestInterceptFn,
        requires: Vec<String>,
        schemas: SchemaSet,
    },
}

fn boxed_request_fn<F, Fut, O>(f: F) -> RequestInterceptFn
where
    F: Fn(Request, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: Into<RequestFlow> + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |request, services| {
        let f = f.clone();
        async move {
            let flow: RequestFlow = f(request, services).await.into();
            flow
        }
        .boxed()
    })
}

impl RequestInterceptor {
    pub fn function<F, Fut, O>(f: F) -> Self
    where
        F: Fn(Request, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Into<RequestFlow> + 'static,
    {
        RequestInterceptor::Function {
            intercept: boxed_request_fn(f),
            requires: Vec::new(),
        }
    }

    pub fn named<F, Fut, O>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Into<RequestFlow> + 'static,
    {
        RequestInterceptor::Named {
            name: name.into(),
            intercept: boxed_request_fn(f),
            requires: Vec::new(),
            schemas: SchemaSet::default(),
        }
    }

    /// Declares the services this interceptor receives, in order.
    pub fn requires<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut self {
            RequestInterceptor::Function { requires, .. }
            | RequestInterceptor::Named { requires, .. } => *requires = names(services),
        }
        self
    }

    /// Attaches schemas merged into every route using this interceptor.
    pub fn with_schemas(self, schemas: SchemaSet) -> Self {
        match self {
            RequestInterceptor::Function {
                intercept,
                requires,
            } => RequestInterceptor::Named {
                name: ANONYMOUS.to_string(),
                intercept,
                requires,
                schemas,
            },
            RequestInterceptor::Named {
                name,
                intercept,
                requires,
                ..
            } => RequestInterceptor::Named {
                name,
                intercept,
                requires,
                schemas,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RequestInterceptor::Function { .. } => ANONYMOUS,
            RequestInterceptor::Named { name, .. } => name,
        }
    }

    pub fn required_services(&self) -> &[String] {
        match self {
            RequestInterceptor::Function { requires, .. }
            | RequestInterceptor::Named { requires, .. } => requires,
        }
    }

    pub fn schemas(&self) -> Option<&SchemaSet> {
        match self {
            RequestInterceptor::Function { .. } => None,
            RequestInterceptor::Named { schemas, .. } => Some(schemas),
        }
    }

    pub(crate) fn call(&self, request: Request, services: Services) -> BoxFuture<'static, RequestFlow> {
        match self {
            RequestInterceptor::Function { intercept, .. }
            | RequestInterceptor::Named { intercept, .. } => intercept(request, services),
        }
    }
}

impl fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("name", &self.name())
            .field("requires", &self.required_services())
            .finish()
    }
}

/// Transforms the response at the moments it is registered for.
#[derive(Clone)]
pub enum ResponseInterceptor {
    /// Runs at [`Moment::DEFAULT`] only.
    Function {
        intercept: ResponseInterceptFn,
        requires: Vec<String>,
    },
    Named {
        name: String,
        intercept: ResponseInterceptFn,
        requires: Vec<String>,
        /// Empty means [`Moment::DEFAULT`].
        moments: Vec<Moment>,
        schemas: SchemaSet,
    },
}

fn boxed_response_fn<F, Fut>(f: F) -> ResponseInterceptFn
where
    F: Fn(Response, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |response, services| {
        let f = f.clone();
        async move { f(response, services).await }.boxed()
    })
}

impl ResponseInterceptor {
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Response, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        ResponseInterceptor::Function {
            intercept: boxed_response_fn(f),
            requires: Vec::new(),
        }
    }

    pub fn named<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Response, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        ResponseInterceptor::Named {
            name: name.into(),
            intercept: boxed_response_fn(f),
            requires: Vec::new(),
            moments: Vec::new(),
            schemas: SchemaSet::default(),
        }
    }

    pub fn requires<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut self {
            ResponseInterceptor::Function { requires, .. }
            | ResponseInterceptor::Named { requires, .. } => *requires = names(services),
        }
        self
    }

    /// Sets the moments this interceptor runs at.
    pub fn at<I>(self, when: I) -> Self
    where
        I: IntoIterator<Item = Moment>,
    {
        let when: Vec<Moment> = when.into_iter().collect();
        match self {
            ResponseInterceptor::Function {
                intercept,
                requires,
            } => ResponseInterceptor::Named {
                name: ANONYMOUS.to_string(),
                intercept,
                requires,
                moments: when,
                schemas: SchemaSet::default(),
            },
            ResponseInterceptor::Named {
                name,
                intercept,
                requires,
                schemas,
                ..
            } => ResponseInterceptor::Named {
                name,
                intercept,
                requires,
                moments: when,
                schemas,
            },
        }
    }

    pub fn with_schemas(self, schemas: SchemaSet) -> Self {
        match self {
            ResponseInterceptor::Function {
                intercept,
                requires,
            } => ResponseInterceptor::Named {
                name: ANONYMOUS.to_string(),
                intercept,
                requires,
                moments: Vec::new(),
                schemas,
            },
            ResponseInterceptor::Named {
                name,
                intercept,
                requires,
                moments,
                ..
            } => ResponseInterceptor::Named {
                name,
                intercept,
                requires,
                moments,
                schemas,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResponseInterceptor::Function { .. } => ANONYMOUS,
            ResponseInterceptor::Named { name, .. } => name,
        }
    }

    pub fn required_services(&self) -> &[String] {
        match self {
            ResponseInterceptor::Function { requires, .. }
            | ResponseInterceptor::Named { requires, .. } => requires,
        }
    }

    /// Declared moments; empty means [`Moment::DEFAULT`].
    pub fn moments(&self) -> &[Moment] {
        match self {
            ResponseInterceptor::Function { .. } => &[],
            ResponseInterceptor::Named { moments, .. } => moments,
        }
    }

    pub fn schemas(&self) -> Option<&SchemaSet> {
        match self {
            ResponseInterceptor::Function { .. } => None,
            ResponseInterceptor::Named { schemas, .. } => Some(schemas),
        }
    }

    pub(crate) fn call(&self, response: Response, services: Services) -> BoxFuture<'static, Response> {
        match self {
            ResponseInterceptor::Function { intercept, .. }
            | ResponseInterceptor::Named { intercept, .. } => intercept(response, services),
        }
    }
}

impl fmt::Debug for ResponseInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseInterceptor")
            .field("name", &self.name())
            .field("moments", &self.moments())
            .field("requires", &self.required_services())
            .finish()
    }
}
