//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, redirect cap sane, limits > 0)
//! - Check that referenced files exist
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::RelayConfig;

/// Upper bound accepted for `forwarding.max_redirects`.
pub const MAX_REDIRECT_CAP: usize = 100;

/// One semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a deserialized config for values that parse but make no sense.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if !Path::new(&tls.cert_path).exists() {
            errors.push(ValidationError::new(
                "listener.tls.cert_path",
                format!("{} does not exist", tls.cert_path),
            ));
        }
        if !Path::new(&tls.key_path).exists() {
            errors.push(ValidationError::new(
                "listener.tls.key_path",
                format!("{} does not exist", tls.key_path),
            ));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }

    let redirects = config.forwarding.max_redirects;
    if redirects == 0 || redirects > MAX_REDIRECT_CAP {
        errors.push(ValidationError::new(
            "forwarding.max_redirects",
            format!("must be between 1 and {MAX_REDIRECT_CAP}, got {redirects}"),
        ));
    }
    if config.forwarding.user_agent.trim().is_empty() {
        errors.push(ValidationError::new("forwarding.user_agent", "must not be empty"));
    }
    if config.forwarding.max_response_bytes == 0 {
        errors.push(ValidationError::new(
            "forwarding.max_response_bytes",
            "must be greater than 0",
        ));
    }
    for path in &config.forwarding.extra_root_certs {
        if !Path::new(path).exists() {
            errors.push(ValidationError::new(
                "forwarding.extra_root_certs",
                format!("{path} does not exist"),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
