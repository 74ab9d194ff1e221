//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID for every inbound request
//! - Expose it to inner layers through request extensions
//! - Stamp it on every response, including rejections
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The gateway's ID overwrites any `X-Request-ID` produced further down
//! - IDs are for correlation only, never for authorization

use std::fmt;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const NAMESPACE: &str = "ns3::";

/// Opaque per-request correlation ID: `ns3::` followed by 32 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("{}{}", NAMESPACE, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn header_value(&self) -> HeaderValue {
        // Namespace and hex digits are always visible ASCII.
        HeaderValue::from_str(&self.0).unwrap_or_else(|_| HeaderValue::from_static("ns3::invalid"))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access the request ID attached by [`stamp_request_id`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Middleware: attach a fresh [`RequestId`] and stamp it on the response.
pub async fn stamp_request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = RequestId::generate();
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(X_REQUEST_ID, id.header_value());
    response
}
