//! Caller authentication.
//!
//! Compares the token a caller presents against the service secret. This is
//! independent of the credential the gateway injects toward the upstream.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AuthConfig;
use crate::error::GatewayError;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::security::credentials::strip_bearer;

/// Caller-facing credential check.
#[derive(Debug, Clone)]
pub struct AuthGate {
    service_key: String,
    static_key: Option<String>,
}

impl AuthGate {
    pub fn new(service_key: impl Into<String>, static_key: Option<String>) -> Self {
        Self {
            service_key: service_key.into(),
            static_key: static_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.service_api_key.clone().unwrap_or_default(),
            config.static_api_key.clone(),
        )
    }

    /// Resolve the caller token and compare it with the service secret.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), GatewayError> {
        let presented = match headers.get(AUTHORIZATION) {
            Some(value) if !value.is_empty() => match value.to_str() {
                Ok(raw) => Some(strip_bearer(raw)),
                Err(_) => return Err(GatewayError::InvalidToken),
            },
            _ => None,
        };

        let token = presented
            .or(self.static_key.as_deref())
            .ok_or(GatewayError::MissingToken)?;

        if token.is_empty() || token != self.service_key {
            return Err(GatewayError::InvalidToken);
        }
        Ok(())
    }
}

/// Middleware: reject unauthenticated callers before any route handler runs.
pub async fn auth_gate(
    State(gate): State<Arc<AuthGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match gate.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            let reason = match err {
                GatewayError::MissingToken => "missing",
                _ => "invalid",
            };
            tracing::warn!(
                request_id = %request.request_id().map(|id| id.as_str()).unwrap_or("unknown"),
                method = %request.method(),
                path = %request.uri().path(),
                reason,
                "Caller rejected"
            );
            metrics::record_auth_rejection(reason);
            err.into_response()
        }
    }
}
