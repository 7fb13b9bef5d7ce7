//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Listener and fallback settings.
    pub server: ServerConfig,

    /// Default limits applied to every route.
    pub route: RouteLimits,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds (0 disables it).
    pub request_timeout_secs: u64,

    /// Message of the 404 returned when no route matches.
    pub not_found_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            not_found_message: "This resource is not avaliable in this server!".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Per-route decoding limits.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouteLimits {
    pub body: BodyLimits,
    pub files: FileLimits,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BodyLimits {
    /// Maximum accepted body size in bytes, files included.
    pub max_body_size: usize,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FileLimits {
    /// Accepted MIME types; `type/*` and `*/*` wildcards are allowed.
    pub accept_mimes: Vec<String>,

    /// Maximum number of files in one request.
    pub max_files: usize,

    /// Maximum size of a single file in bytes.
    pub max_file_size: usize,

    /// Minimum size of a single file in bytes.
    pub minimum_file_size: usize,
}

impl Default for FileLimits {
    fn default() -> Self {
        Self {
            accept_mimes: vec!["*/*".to_string()],
            max_files: 10,
            max_file_size: 5 * 1024 * 1024,
            minimum_file_size: 1,
        }
    }
}

/// Partial route limits; every `Some` field replaces the server default.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouteLimitsOverride {
    pub max_body_size: Option<usize>,
    pub accept_mimes: Option<Vec<String>>,
    pub max_files: Option<usize>,
    pub max_file_size: Option<usize>,
    pub minimum_file_size: Option<usize>,
}

impl RouteLimitsOverride {
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    pub fn accept_mimes<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept_mimes = Some(mimes.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = Some(count);
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn minimum_file_size(mut self, bytes: usize) -> Self {
        self.minimum_file_size = Some(bytes);
        self
    }

    /// Fills unset fields from `outer`, keeping the ones already set here.
    pub fn absorb_outer(&mut self, outer: &RouteLimitsOverride) {
        self.max_body_size = self.max_body_size.or(outer.max_body_size);
        if self.accept_mimes.is_none() {
            self.accept_mimes = outer.accept_mimes.clone();
        }
        self.max_files = self.max_files.or(outer.max_files);
        self.max_file_size = self.max_file_size.or(outer.max_file_size);
        self.minimum_file_size = self.minimum_file_size.or(outer.minimum_file_size);
    }
}

impl RouteLimits {
    /// Deep-merges a route's partial override over these defaults.
    pub fn merged(&self, over: &RouteLimitsOverride) -> RouteLimits {
        RouteLimits {
            body: BodyLimits {
                max_body_size: over.max_body_size.unwrap_or(self.body.max_body_size),
            },
            files: FileLimits {
                accept_mimes: over
                    .accept_mimes
                    .clone()
                    .unwrap_or_else(|| self.files.accept_mimes.clone()),
                max_files: over.max_files.unwrap_or(self.files.max_files),
                max_file_size: over.max_file_size.unwrap_or(self.files.max_file_size),
                minimum_file_size: over
                    .minimum_file_size
                    .unwrap_or(self.files.minimum_file_size),
            },
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the compact format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
