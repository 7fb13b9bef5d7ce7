//! Service providers and the registry that holds them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::container::scope::ServiceScope;

/// A resolved service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

type FactoryFn = Arc<dyn Fn(&ServiceScope) -> Result<Service, ResolveError> + Send + Sync>;

/// Errors raised while resolving named services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no service registered under \"{0}\"")]
    NotRegistered(String),

    #[error("circular service dependency: {}", .0.join(" -> "))]
    Circular(Vec<String>),

    #[error("service \"{name}\" could not be built: {reason}")]
    Factory { name: String, reason: String },

    #[error("could not resolve service(s): {}", .missing.join(", "))]
    Unresolved {
        requested: Vec<String>,
        missing: Vec<String>,
    },
}

/// How long a factory-built instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Built once per registry.
    Singleton,
    /// Built once per request scope.
    Scoped,
    /// Built on every resolution.
    Transient,
}

/// How a named service is obtained.
#[derive(Clone)]
pub enum ServiceProvider {
    Value(Service),
    Factory { lifetime: Lifetime, build: FactoryFn },
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceProvider::Value(_) => f.write_str("Value"),
            ServiceProvider::Factory { lifetime, .. } => {
                f.debug_struct("Factory").field("lifetime", lifetime).finish()
            }
        }
    }
}

impl ServiceProvider {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        ServiceProvider::Value(Arc::new(value))
    }

    pub fn factory<T, F>(lifetime: Lifetime, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceScope) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        ServiceProvider::Factory {
            lifetime,
            build: Arc::new(move |scope| build(scope).map(|v| Arc::new(v) as Service)),
        }
    }

    pub fn singleton<T, F>(build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceScope) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        Self::factory(Lifetime::Singleton, build)
    }

    pub fn scoped<T, F>(build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceScope) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        Self::factory(Lifetime::Scoped, build)
    }

    pub fn transient<T, F>(build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceScope) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        Self::factory(Lifetime::Transient, build)
    }
}

/// A set of named providers plus the cache for their singletons.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    providers: HashMap<String, ServiceProvider>,
    singletons: DashMap<String, Service>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: ServiceProvider) -> &mut Self {
        let name = name.into();
        self.singletons.remove(&name);
        self.providers.insert(name, provider);
        self
    }

    pub fn with(mut self, name: impl Into<String>, provider: ServiceProvider) -> Self {
        self.register(name, provider);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn provider(&self, name: &str) -> Option<&ServiceProvider> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Adds every provider of `outer` not already registered here.
    pub fn absorb_outer(&mut self, outer: &ServiceRegistry) {
        for (name, provider) in &outer.providers {
            self.providers
                .entry(name.clone())
                .or_insert_with(|| provider.clone());
        }
    }

    pub(crate) fn cached_singleton(&self, name: &str) -> Option<Service> {
        self.singletons.get(name).map(|entry| entry.value().clone())
    }

    pub(crate) fn cache_singleton(&self, name: &str, service: Service) -> Service {
        self.singletons
            .entry(name.to_string())
            .or_insert(service)
            .value()
            .clone()
    }
}
