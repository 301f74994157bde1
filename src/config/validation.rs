//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
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

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("{:?} is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if !config.binding.resource_root.starts_with('/') {
        errors.push(ValidationError::new("binding.resource_root", "must start with '/'"));
    }
    if config.binding.max_body_bytes == 0 {
        errors.push(ValidationError::new("binding.max_body_bytes", "must be greater than 0"));
    }

    for (field, value) in [
        ("tracing.trace_header", &config.tracing.trace_header),
        ("tracing.span_header", &config.tracing.span_header),
    ] {
        if HeaderName::from_bytes(value.as_bytes()).is_err() {
            errors.push(ValidationError::new(field, format!("{value:?} is not a valid header name")));
        }
    }
    if config.tracing.trace_header.eq_ignore_ascii_case(&config.tracing.span_header) {
        errors.push(ValidationError::new("tracing.span_header", "must differ from trace_header"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
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
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.server.bind_address = "nowhere".into();
        config.binding.resource_root = "api".into();
        config.tracing.span_header = "TR-TRACE".into();
        config.binding.max_body_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "binding.resource_root",
                "binding.max_body_bytes",
                "tracing.span_header",
            ]
        );
    }

    #[test]
    fn test_bad_header_name() {
        let mut config = ServiceConfig::default();
        config.tracing.trace_header = "has space".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "tracing.trace_header");
    }
}
