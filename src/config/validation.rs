//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! All problems are reported together, not just the first.

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.body.limit_bytes == 0 {
        errors.push(ValidationError::new("body.limit_bytes", "must be greater than 0"));
    }

    for origin in &config.cors.allowed_origins {
        match url::Url::parse(origin) {
            Ok(url) if url.host_str().is_some() && url.path() == "/" => {}
            _ => errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not a scheme://host[:port] origin", origin),
            )),
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled {
        if rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
        if rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
        }
        if rate_limit.sweep_interval_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.sweep_interval_secs",
                "must be greater than 0",
            ));
        }
        if !rate_limit.path_prefix.starts_with('/') {
            errors.push(ValidationError::new("rate_limit.path_prefix", "must start with '/'"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.access_log.path.trim().is_empty() {
        errors.push(ValidationError::new("access_log.path", "must not be empty"));
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
