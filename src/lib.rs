//! Authenticating gateway in front of a single OpenAI-compatible upstream.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::Gateway;
pub use lifecycle::Shutdown;
