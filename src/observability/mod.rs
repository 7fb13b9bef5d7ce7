//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Route handlers produce:
//!     → logging.rs (structured log events, one span per request)
//!     → metrics.rs (per-route counters and latency histograms)
//!
//! Consumers:
//!     → stdout (compact or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID is recorded on every request span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
