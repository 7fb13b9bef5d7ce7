//! HTTP request pipeline library.
//!
//! Routes declare schemas, guards and interceptors; every request runs
//! through the same stages:
//!
//! ```text
//! decode + validate → request interceptors → guards → handler
//!     → response interceptors (by moment) → client
//! ```

pub mod config;
pub mod container;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod schema;

pub use config::HttpConfig;
pub use container::{Lifetime, ServiceProvider, ServiceRegistry, Services};
pub use http::{HttpError, HttpServer, Request, Response};
pub use pipeline::{Guard, Moment, RequestInterceptor, ResponseInterceptor, RouteHandler};
pub use routing::{apply_controllers, Controller, Route};
