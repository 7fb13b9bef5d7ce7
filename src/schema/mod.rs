//! Request schema model.
//!
//! # Data Flow
//! ```text
//! Route / Controller / Guard / Interceptor declarations
//!     → compose.rs (ordered merge, outer scopes fill gaps)
//!     → SchemaSet (one per route, computed once)
//!     → forger validates body, headers, cookies, url and query params
//! ```
//!
//! # Design Decisions
//! - Validation projects values onto declared keys; undeclared keys are dropped
//! - Param values arrive as strings and are coerced to the declared type
//! - Issues are structured (`path` + `message`) so error responses are stable

pub mod compose;
pub mod value;

pub use compose::{compose, FileRule, FilesSchema, ParamSchema, SchemaSet};
pub use value::{
    any, array, boolean, integer, number, object, string, ArraySchema, NumberSchema, ObjectSchema,
    ParamError, Schema, SchemaIssue, StringSchema,
};
