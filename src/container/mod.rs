//! Named-service container.
//!
//! # Data Flow
//! ```text
//! startup: ServiceRegistry (process-wide providers)
//! route:   ServiceRegistry (route `register` overrides, merged from controllers)
//! request: ServiceScope { provided, scoped cache } → route overrides → process registry
//!     → resolve_all(requires) → Services handed to guard / interceptor / handler
//! ```
//!
//! # Design Decisions
//! - Dependencies are declared by name up front; nothing is inferred at runtime
//! - One scope per request; dropped when the request completes
//! - Registries are immutable once the server holds them; only caches mutate

pub mod registry;
pub mod scope;

pub use registry::{Lifetime, ResolveError, Service, ServiceProvider, ServiceRegistry};
pub use scope::{ServiceScope, Services};
