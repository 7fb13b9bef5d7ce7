//! Request-scoped service resolution.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::container::registry::{Lifetime, ResolveError, Service, ServiceProvider, ServiceRegistry};

/// A request-lifetime child of the process registry.
///
/// Lookup order: services provided during this request, then the route's
/// overrides, then the process-wide registry.
pub struct ServiceScope {
    root: Arc<ServiceRegistry>,
    route: Option<Arc<ServiceRegistry>>,
    provided: DashMap<String, Service>,
    scoped: DashMap<String, Service>,
    resolving: Mutex<Vec<String>>,
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("provided", &self.provided.len())
            .field("scoped", &self.scoped.len())
            .finish()
    }
}

impl ServiceScope {
    pub fn new(root: Arc<ServiceRegistry>, route: Option<Arc<ServiceRegistry>>) -> Self {
        Self {
            root,
            route,
            provided: DashMap::new(),
            scoped: DashMap::new(),
            resolving: Mutex::new(Vec::new()),
        }
    }

    /// Registers an ad-hoc service visible only within this scope.
    pub fn provide(&self, name: impl Into<String>, service: Service) {
        self.provided.insert(name.into(), service);
    }

    fn lookup(&self, name: &str) -> Option<(&ServiceRegistry, &ServiceProvider)> {
        if let Some(route) = &self.route {
            if let Some(provider) = route.provider(name) {
                return Some((route.as_ref(), provider));
            }
        }
        self.root
            .provider(name)
            .map(|provider| (self.root.as_ref(), provider))
    }

    /// Resolves a single named service.
    pub fn resolve(&self, name: &str) -> Result<Service, ResolveError> {
        if let Some(service) = self.provided.get(name) {
            return Ok(service.value().clone());
        }
        let (owner, provider) = self
            .lookup(name)
            .ok_or_else(|| ResolveError::NotRegistered(name.to_string()))?;

        let (lifetime, build) = match provider {
            ServiceProvider::Value(service) => return Ok(service.clone()),
            ServiceProvider::Factory { lifetime, build } => (*lifetime, build.clone()),
        };

        match lifetime {
            Lifetime::Singleton => {
                if let Some(service) = owner.cached_singleton(name) {
                    return Ok(service);
                }
                let service = self.build(name, |scope| build(scope))?;
                Ok(owner.cache_singleton(name, service))
            }
            Lifetime::Scoped => {
                if let Some(service) = self.scoped.get(name) {
                    return Ok(service.value().clone());
                }
                let service = self.build(name, |scope| build(scope))?;
                Ok(self
                    .scoped
                    .entry(name.to_string())
                    .or_insert(service)
                    .value()
                    .clone())
            }
            Lifetime::Transient => self.build(name, |scope| build(scope)),
        }
    }

    fn build<F>(&self, name: &str, build: F) -> Result<Service, ResolveError>
    where
        F: FnOnce(&ServiceScope) -> Result<Service, ResolveError>,
    {
        {
            let mut stack = self
                .resolving
                .lock()
                .map_err(|_| ResolveError::Factory {
                    name: name.to_string(),
                    reason: "resolution stack poisoned".into(),
                })?;
            if stack.iter().any(|n| n == name) {
                let mut chain = stack.clone();
                chain.push(name.to_string());
                return Err(ResolveError::Circular(chain));
            }
            stack.push(name.to_string());
        }
        let result = build(self);
        if let Ok(mut stack) = self.resolving.lock() {
            stack.pop();
        }
        result
    }

    /// Resolves every name in order; all failures are reported together.
    pub fn resolve_all(&self, names: &[String]) -> Result<Services, ResolveError> {
        let mut entries = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.resolve(name) {
                Ok(service) => entries.push((name.clone(), service)),
                Err(err) => {
                    tracing::debug!(service = %name, error = %err, "Service resolution failed");
                    missing.push(name.clone());
                }
            }
        }
        if missing.is_empty() {
            Ok(Services { entries })
        } else {
            Err(ResolveError::Unresolved {
                requested: names.to_vec(),
                missing,
            })
        }
    }
}

/// The services a guard, interceptor or handler declared it needs.
#[derive(Clone, Default)]
pub struct Services {
    entries: Vec<(String, Service)>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Services {
    /// Typed access by name. `None` if absent or of another type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, service)| service.clone().downcast::<T>().ok())
    }

    /// Like [`get`](Self::get) but yields an internal error for use with `?`.
    pub fn require<T: Any + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, crate::http::HttpError> {
        self.get(name).ok_or_else(|| {
            crate::http::HttpError::internal(format!(
                "Service \"{name}\" is not available with the requested type"
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
