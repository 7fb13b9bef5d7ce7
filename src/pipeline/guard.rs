//! Route guards.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::container::Services;
use crate::http::Request;
use crate::pipeline::interceptor::{names, ANONYMOUS};
use crate::pipeline::reply::GuardVerdict;
use crate::routing::Route;
use crate::schema::SchemaSet;

/// Guards see a copy of the request; they cannot change it.
pub type GuardFn =
    Arc<dyn Fn(Request, Arc<Route>, Services) -> BoxFuture<'static, GuardVerdict> + Send + Sync>;

/// A gate evaluated, in order, before the handler.
#[derive(Clone)]
pub enum Guard {
    Function {
        check: GuardFn,
        requires: Vec<String>,
    },
    Named {
        name: String,
        check: GuardFn,
        requires: Vec<String>,
        schemas: SchemaSet,
    },
}

fn boxed_guard_fn<F, Fut, O>(f: F) -> GuardFn
where
    F: Fn(Request, Arc<Route>, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: Into<GuardVerdict> + 'static,
{
    let f = Arc::new(f);
    // The call happens inside the future so a panicking guard is caught with it.
    Arc::new(move |request, route, services| {
        let f = f.clone();
        async move {
            let verdict: GuardVerdict = f(request, route, services).await.into();
            verdict
        }
        .boxed()
    })
}

impl Guard {
    pub fn function<F, Fut, O>(f: F) -> Self
    where
        F: Fn(Request, Arc<Route>, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Into<GuardVerdict> + 'static,
    {
        Guard::Function {
            check: boxed_guard_fn(f),
            requires: Vec::new(),
        }
    }

    pub fn named<F, Fut, O>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request, Arc<Route>, Services) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Into<GuardVerdict> + 'static,
    {
        Guard::Named {
            name: name.into(),
            check: boxed_guard_fn(f),
            requires: Vec::new(),
            schemas: SchemaSet::default(),
        }
    }

    pub fn requires<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut self {
            Guard::Function { requires, .. } | Guard::Named { requires, .. } => {
                *requires = names(services)
            }
        }
        self
    }

    /// Attaches schemas merged into every route this guard protects.
    pub fn with_schemas(self, schemas: SchemaSet) -> Self {
        match self {
            Guard::Function { check, requires } => Guard::Named {
                name: ANONYMOUS.to_string(),
                check,
                requires,
                schemas,
            },
            Guard::Named {
                name,
                check,
                requires,
                ..
            } => Guard::Named {
                name,
                check,
                requires,
                schemas,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Guard::Function { .. } => ANONYMOUS,
            Guard::Named { name, .. } => name,
        }
    }

    pub fn required_services(&self) -> &[String] {
        match self {
            Guard::Function { requires, .. } | Guard::Named { requires, .. } => requires,
        }
    }

    pub fn schemas(&self) -> Option<&SchemaSet> {
        match self {
            Guard::Function { .. } => None,
            Guard::Named { schemas, .. } => Some(schemas),
        }
    }

    pub(crate) fn call(
        &self,
        request: Request,
        route: Arc<Route>,
        services: Services,
    ) -> BoxFuture<'static, GuardVerdict> {
        match self {
            Guard::Function { check, .. } | Guard::Named { check, .. } => {
                check(request, route, services)
            }
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("name", &self.name())
            .field("requires", &self.required_services())
            .finish()
    }
}
