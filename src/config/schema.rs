//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::credentials::normalize_token;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API location and credential.
    pub upstream: UpstreamConfig,

    /// Caller-facing credential check.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream connection pool sizing.
    pub pool: PoolConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

impl GatewayConfig {
    /// The credential injected toward the upstream, already normalized.
    ///
    /// Falls back to the static caller token when no dedicated upstream key is set.
    /// Returns `None` when nothing usable is configured.
    pub fn upstream_token(&self) -> Option<String> {
        self.upstream
            .api_key
            .as_deref()
            .or(self.auth.static_api_key.as_deref())
            .map(normalize_token)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every upstream path is appended to (e.g., "http://llm/v1").
    /// Required; empty means unset.
    pub base_url: String,

    /// Token sent to the upstream. Defaults to `auth.static_api_key`.
    pub api_key: Option<String>,

    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_env_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            use_env_proxy: true,
        }
    }
}

/// Caller credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret every caller token is compared against.
    pub service_api_key: Option<String>,

    /// Used in place of a missing `Authorization` header.
    pub static_api_key: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: f64,

    /// Per-read timeout in seconds. Long, to survive slow generations.
    pub read_secs: f64,

    /// Ceiling on producing response headers, in seconds. When unset it is
    /// derived from the retry budget.
    pub request_secs: Option<f64>,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_grace_secs: f64,
}

/// Largest timeout accepted for any setting: one week.
pub const MAX_TIMEOUT_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Seconds to `Duration`, saturating instead of panicking on values
/// validation would reject.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_TIMEOUT_SECS)).unwrap_or(Duration::ZERO)
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        secs(self.read_secs)
    }

    /// Worst case for one buffered call: every attempt connects and then
    /// waits a full read timeout.
    pub fn retry_budget_secs(&self, max_retries: u32) -> f64 {
        (f64::from(max_retries) + 1.0) * (self.connect_secs + self.read_secs)
    }

    /// Deadline for producing response headers.
    pub fn request(&self, max_retries: u32) -> Duration {
        match self.request_secs {
            Some(ceiling) => secs(ceiling),
            None => Duration::try_from_secs_f64(self.retry_budget_secs(max_retries))
                .unwrap_or(Duration::MAX),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5.0,
            read_secs: 600.0,
            request_secs: None,
            shutdown_grace_secs: 30.0,
        }
    }
}

/// Upstream connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle keep-alive connections retained per upstream host.
    pub max_idle_per_host: usize,

    /// Maximum concurrent upstream exchanges (backpressure).
    pub max_connections: usize,

    /// Chunks buffered between the upstream reader and the client writer.
    pub stream_buffer: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 100,
            max_connections: 200,
            stream_buffer: 16,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first one fails.
    pub max_retries: u32,

    /// Also retry read timeouts on POST and PATCH.
    pub retry_non_idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_non_idempotent: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Answer CORS preflights for any origin.
    pub cors_allow_any_origin: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors_allow_any_origin: true,
        }
    }
}
