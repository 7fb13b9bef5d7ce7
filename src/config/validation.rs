//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, addresses parse)
//! - Check MIME patterns are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HttpConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::HttpConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted key of the offending setting.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &HttpConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("\"{}\" is not a socket address", config.server.bind_address),
        ));
    }

    let body = &config.route.body;
    if body.max_body_size == 0 {
        errors.push(ValidationError::new(
            "route.body.max_body_size",
            "must be greater than 0",
        ));
    }

    let files = &config.route.files;
    if files.max_file_size == 0 {
        errors.push(ValidationError::new(
            "route.files.max_file_size",
            "must be greater than 0",
        ));
    }
    if files.minimum_file_size > files.max_file_size {
        errors.push(ValidationError::new(
            "route.files.minimum_file_size",
            "must not exceed max_file_size",
        ));
    }
    for mime in &files.accept_mimes {
        let well_formed = mime
            .split_once('/')
            .is_some_and(|(kind, sub)| !kind.is_empty() && !sub.is_empty());
        if !well_formed {
            errors.push(ValidationError::new(
                "route.files.accept_mimes",
                format!("\"{mime}\" is not a type/subtype pattern"),
            ));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("\"{}\" is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = HttpConfig::default();
        config.server.bind_address = "nowhere".into();
        config.route.body.max_body_size = 0;
        config.route.files.accept_mimes = vec!["image".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "route.body.max_body_size",
                "route.files.accept_mimes"
            ]
        );
    }
}
