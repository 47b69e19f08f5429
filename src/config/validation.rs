//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (dop ≥ 1, budgets > 0, backlog fits the OS type)
//! - Reject non-ASCII response bodies, whose byte length would not match
//!   what a reader counts as characters
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StressConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::StressConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
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

impl std::error::Error for ValidationError {}

/// Check every semantic constraint and return all violations.
pub fn validate_config(config: &StressConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.driver.dop == 0 {
        errors.push(ValidationError::new("driver.dop", "must be at least 1"));
    }
    if config.driver.requests == 0 {
        errors.push(ValidationError::new("driver.requests", "must be at least 1"));
    }

    if !config.server.response_body.is_ascii() {
        errors.push(ValidationError::new(
            "server.response_body",
            "must be ASCII so Content-Length matches the body",
        ));
    }
    if config.server.read_timeout_ms == 0 {
        errors.push(ValidationError::new("server.read_timeout_ms", "must be greater than 0"));
    }

    if config.client.request_timeout_secs == 0 {
        errors.push(ValidationError::new("client.request_timeout_secs", "must be greater than 0"));
    }
    if config.client.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("client.connect_timeout_secs", "must be greater than 0"));
    }

    if config.fault.pending_requests == 0 {
        errors.push(ValidationError::new("fault.pending_requests", "must be at least 1"));
    }
    if i32::try_from(config.fault.pending_requests).is_err() {
        errors.push(ValidationError::new(
            "fault.pending_requests",
            "exceeds the maximum listen backlog",
        ));
    }
    if config.fault.deadline_secs == 0 {
        errors.push(ValidationError::new("fault.deadline_secs", "must be greater than 0"));
    }

    if config.leak.max_cycles == 0 {
        errors.push(ValidationError::new("leak.max_cycles", "must be at least 1"));
    }
    if config.leak.budget_secs == 0 {
        errors.push(ValidationError::new("leak.budget_secs", "must be greater than 0"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
