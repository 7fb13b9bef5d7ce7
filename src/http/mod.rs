//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, one method route per registered route)
//!     → parse/ (content-type, bounded body read, decoders)
//!     → request.rs (the pipeline's request value)
//!     → response.rs (status, headers, cookies, body → transport response)
//!     → error.rs (every failure ends as an HttpError response)
//! ```

pub mod error;
pub mod parse;
pub mod request;
pub mod response;
pub mod server;

pub use error::{HttpError, ParamLocation, ValidationFailure};
pub use parse::UploadedFile;
pub use request::Request;
pub use response::{Response, ResponseBody, SameSite, SetCookie};
pub use server::HttpServer;
