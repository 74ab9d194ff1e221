//! Gateway error types.
//!
//! Every handler returns `Result<_, GatewayError>`; the variant alone decides
//! the status code sent to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Gateway-originated failures.
///
/// Statuses returned by the upstream itself are never represented here; those
/// are relayed verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No caller token in the request and no static fallback configured.
    #[error("Missing API token. Supply Authorization header and try again.")]
    MissingToken,

    /// Caller token did not match the service secret.
    #[error("Invalid API token.")]
    InvalidToken,

    /// A dedicated route's path was reached through the generic passthrough.
    #[error("Method not allowed for this path (handled elsewhere)")]
    ReservedPath(String),

    /// The inbound body was not the JSON a dedicated route requires.
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    /// The upstream answered, but not with JSON where JSON is required.
    #[error("Bad upstream response (non-JSON)")]
    BadUpstreamResponse,

    /// The upstream exchange failed in a way retrying would not fix.
    #[error("Upstream request failed: {0}")]
    UpstreamFailed(String),

    /// No response could be obtained from the upstream.
    #[error("Upstream {context} failed after {attempts} attempt(s): {message}")]
    UpstreamUnreachable {
        context: &'static str,
        attempts: u32,
        message: String,
    },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingToken => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidToken => StatusCode::FORBIDDEN,
            GatewayError::ReservedPath(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::BadUpstreamResponse | GatewayError::UpstreamFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::UpstreamUnreachable { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
