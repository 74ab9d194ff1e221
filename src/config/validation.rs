//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check mandatory credentials and the upstream base URL
//! - Validate value ranges (timeouts > 0, pool caps > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, MAX_TIMEOUT_SECS};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.service_api_key (SERVICE_API_KEY) must be set")]
    MissingServiceKey,

    #[error("no upstream token: set upstream.api_key or auth.static_api_key (STATIC_API_KEY)")]
    MissingUpstreamToken,

    #[error("upstream.base_url (UPSTREAM_BASE_URL) must be set")]
    MissingBaseUrl,

    #[error("upstream.base_url is invalid: {0}")]
    InvalidBaseUrl(String),

    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },

    #[error("timeouts.request_secs ({ceiling}s) is shorter than the retry budget ({budget}s)")]
    RequestCeilingTooShort { ceiling: u64, budget: u64 },

    #[error("listener.bind_address is invalid: {0}")]
    InvalidBindAddress(String),
}

/// Check the whole configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config
        .auth
        .service_api_key
        .as_deref()
        .map_or(true, str::is_empty)
    {
        errors.push(ValidationError::MissingServiceKey);
    }

    if config.upstream_token().is_none() {
        errors.push(ValidationError::MissingUpstreamToken);
    }

    if config.upstream.base_url.trim().is_empty() {
        errors.push(ValidationError::MissingBaseUrl);
    } else {
        match Url::parse(&config.upstream.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::InvalidBaseUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            ))),
            Err(e) => errors.push(ValidationError::InvalidBaseUrl(e.to_string())),
        }
    }

    if let Err(e) = config.listener.bind_address.parse::<std::net::SocketAddr>() {
        errors.push(ValidationError::InvalidBindAddress(e.to_string()));
    }

    let timeouts = &config.timeouts;
    let mut positive = vec![
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.read_secs", timeouts.read_secs),
    ];
    if let Some(ceiling) = timeouts.request_secs {
        positive.push(("timeouts.request_secs", ceiling));
    }
    for (field, value) in positive {
        if !(value > 0.0 && value <= MAX_TIMEOUT_SECS) {
            errors.push(ValidationError::OutOfRange { field });
        }
    }
    if !(timeouts.shutdown_grace_secs >= 0.0 && timeouts.shutdown_grace_secs <= MAX_TIMEOUT_SECS) {
        errors.push(ValidationError::OutOfRange { field: "timeouts.shutdown_grace_secs" });
    }

    // The ceiling must outlast every attempt the retry policy may make.
    if let Some(ceiling) = timeouts.request_secs {
        let budget = timeouts.retry_budget_secs(config.retries.max_retries);
        if ceiling < budget {
            errors.push(ValidationError::RequestCeilingTooShort {
                ceiling: ceiling as u64,
                budget: budget.ceil() as u64,
            });
        }
    }

    if config.pool.max_connections == 0 {
        errors.push(ValidationError::OutOfRange { field: "pool.max_connections" });
    }
    if config.pool.stream_buffer == 0 {
        errors.push(ValidationError::OutOfRange { field: "pool.stream_buffer" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
