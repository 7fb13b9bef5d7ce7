//! Route definitions and grouping.
//!
//! # Data Flow
//! ```text
//! Route::new(url, handler).method(..).guard(..).body(..)
//!     → apply_controllers (outer scopes prepended / gap-filled)
//!     → HttpServer::add_route
//!     → pattern::to_router_paths → one axum path per optional-segment variant
//! ```
//!
//! # Design Decisions
//! - Route patterns use `:name`, `:name?` and `*`; translation happens once
//! - Controllers are applied before the server sees the route

pub mod controller;
pub mod pattern;
pub mod route;

pub use controller::{apply_controllers, Controller};
pub use pattern::{param_names, to_router_paths, WILDCARD_PARAM};
pub use route::{HandlerFn, Route};
