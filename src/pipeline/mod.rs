//! The request pipeline.
//!
//! # Data Flow
//! ```text
//! axum handler (server.rs)
//!     → RouteHandler::handle
//!     → forge.rs (decode + validate)
//!     → request interceptors → guards → route handler
//!     → moment.rs (which response interceptors run)
//!     → Response::into_http
//! ```
//!
//! # Design Decisions
//! - Guards and interceptors are tagged variants: a bare function, or a
//!   named value carrying schemas (and moments, for response interceptors)
//! - User functions receive their services as a declared, ordered list

pub mod forge;
pub mod guard;
pub mod handler;
pub mod interceptor;
pub mod moment;
pub mod reply;

pub use forge::forge_request;
pub use guard::{Guard, GuardFn};
pub use handler::RouteHandler;
pub use interceptor::{RequestInterceptFn, RequestInterceptor, ResponseInterceptFn, ResponseInterceptor};
pub use moment::{Moment, MomentTable};
pub use reply::{GuardVerdict, IntoReply, Reply, RequestFlow};
