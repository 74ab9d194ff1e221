//! Response construction.
//!
//! # Responsibilities
//! - Relay buffered upstream bodies with their status and content type
//! - Relay streamed bodies chunk by chunk
//!
//! # Design Decisions
//! - Upstream error statuses and bodies pass through unchanged
//! - Streaming responses avoid buffering the body
//! - Only status and content type are copied from the upstream

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::upstream::{BufferedResponse, RelayedStream};

/// Relay raw bytes, falling back to `default_content_type` when the upstream
/// did not name one.
pub fn relay_buffered(upstream: BufferedResponse, default_content_type: &'static str) -> Response {
    let content_type = upstream
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(default_content_type));

    (
        upstream.status,
        [(CONTENT_TYPE, content_type)],
        upstream.body,
    )
        .into_response()
}

pub fn relay_stream(stream: RelayedStream) -> Response {
    let content_type = HeaderValue::from_str(&stream.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(crate::upstream::DEFAULT_STREAM_CONTENT_TYPE));

    (
        stream.status,
        [(CONTENT_TYPE, content_type)],
        Body::from_stream(stream.chunks),
    )
        .into_response()
}
