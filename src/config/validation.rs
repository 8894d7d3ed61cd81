//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Detect duplicate backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - An empty backend list is allowed; the router reports it per session

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("backends[{0}]: name must not be empty")]
    EmptyBackendName(usize),

    #[error("backend name '{0}' is used more than once")]
    DuplicateBackend(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_sessions == 0 {
        errors.push(ValidationError::Zero("listener.max_sessions"));
    }
    if config.listener.session_queue == 0 {
        errors.push(ValidationError::Zero("listener.session_queue"));
    }
    if config.listener.max_datagram_size == 0 {
        errors.push(ValidationError::Zero("listener.max_datagram_size"));
    }
    if config.proxy.idle_timeout_secs == 0 {
        errors.push(ValidationError::Zero("proxy.idle_timeout_secs"));
    }

    let mut names = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        if backend.name.is_empty() {
            errors.push(ValidationError::EmptyBackendName(i));
        } else if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        check_address(&mut errors, &format!("backends[{i}].address"), &backend.address);
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}
