//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, statuses in range)
//! - Check the base path shape and error-tag override names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RestconfConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::backend::ErrorTag;
use crate::config::schema::RestconfConfig;

/// A single semantic problem, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &RestconfConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    validate_base_path(&config.endpoint.base_path, &mut errors);

    for (tag, status) in &config.endpoint.error_tag_overrides {
        let field = format!("endpoint.error_tag_overrides.{tag}");
        if tag.parse::<ErrorTag>().is_err() {
            errors.push(ValidationError::new(field.clone(), "unknown error-tag"));
        }
        if !(400..=599).contains(status) {
            errors.push(ValidationError::new(
                field,
                format!("{status} is not an HTTP error status"),
            ));
        }
    }

    if config.endpoint.principal_header.is_empty()
        || axum::http::HeaderName::try_from(config.endpoint.principal_header.as_str()).is_err()
    {
        errors.push(ValidationError::new(
            "endpoint.principal_header",
            "must be a valid header name",
        ));
    }

    if config.sse.channel_capacity == 0 {
        errors.push(ValidationError::new("sse.channel_capacity", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
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

fn validate_base_path(path: &str, errors: &mut Vec<ValidationError>) {
    let field = "endpoint.base_path";
    let Some(rest) = path.strip_prefix('/') else {
        errors.push(ValidationError::new(field, "must start with '/'"));
        return;
    };
    if rest.is_empty() {
        errors.push(ValidationError::new(field, "must contain at least one segment"));
    } else if rest.ends_with('/') {
        errors.push(ValidationError::new(field, "must not end with '/'"));
    } else if rest.split('/').any(str::is_empty) {
        errors.push(ValidationError::new(field, "must not contain empty segments"));
    }
}
