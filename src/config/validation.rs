//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0, addresses parse)
//! - Detect malformed or duplicate startup backends
//!
//! Returns every problem found, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::load_balancer::backend::normalize_address;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    BadSocketAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("health_check.path must start with '/', got {0:?}")]
    BadHealthPath(String),

    #[error("backends: {0}")]
    BadBackend(String),

    #[error("backends: {0} is listed more than once")]
    DuplicateBackend(String),

    #[error("observability.log_level: unknown level {0:?}")]
    BadLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_socket(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_socket(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.interval_secs"));
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.timeout_secs"));
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::BadHealthPath(hc.path.clone()));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }

    let mut seen = HashSet::new();
    for raw in &config.backends {
        match normalize_address(raw) {
            Ok((_, key)) => {
                if !seen.insert(key.clone()) {
                    errors.push(ValidationError::DuplicateBackend(key));
                }
            }
            Err(e) => errors.push(ValidationError::BadBackend(e.to_string())),
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::BadLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_socket(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadSocketAddress {
            field,
            value: value.to_string(),
        });
    }
}
