//! Retry logic.
//!
//! # Responsibilities
//! - Classify upstream failures (connect, timeout, other)
//! - Decide whether another attempt is allowed
//!
//! # Design Decisions
//! - Connection failures always retryable: the request never left the gateway
//! - Read timeouts retryable for idempotent methods only, unless configured
//! - Anything else (protocol errors, bad bodies) is final
//! - No backoff: attempts are issued back to back

use std::error::Error as _;

use reqwest::Method;

use crate::config::RetryConfig;

/// Coarse classification of a failed upstream exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Could not establish a connection (or obtain a pool slot) in time.
    Connect,
    /// Connected, but a read did not complete within the read timeout.
    Timeout,
    /// Any other transport or protocol failure.
    Other,
}

impl FailureKind {
    pub fn of(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            FailureKind::Connect
        } else if err.is_timeout() || timed_out_io(err) {
            FailureKind::Timeout
        } else {
            FailureKind::Other
        }
    }

    /// Connect and timeout failures mean no response was obtained.
    pub fn is_unreachable(self) -> bool {
        matches!(self, FailureKind::Connect | FailureKind::Timeout)
    }
}

/// Read timeouts can surface as a plain `io::ErrorKind::TimedOut` deep in the
/// source chain rather than as a reqwest timeout.
fn timed_out_io(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Bounded, per-call retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_non_idempotent: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_non_idempotent: bool) -> Self {
        Self {
            max_retries,
            retry_non_idempotent,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.retry_non_idempotent)
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a failure on attempt number `attempt` (1-based) may be retried.
    pub fn should_retry(&self, method: &Method, kind: FailureKind, attempt: u32) -> bool {
        if attempt >= self.max_attempts() {
            return false;
        }
        match kind {
            FailureKind::Connect => true,
            FailureKind::Timeout => self.retry_non_idempotent || method.is_idempotent(),
            FailureKind::Other => false,
        }
    }
}
