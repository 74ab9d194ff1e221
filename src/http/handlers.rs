//! Route handlers.
//!
//! Each handler builds the upstream credential, picks the buffered or
//! streamed path, and returns a tagged outcome; status mapping happens in
//! [`GatewayError`]'s `IntoResponse`.

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::http::response::{relay_buffered, relay_stream};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::credentials::bearer;
use crate::upstream::{BufferedResponse, OutboundRequest};

/// Sub-paths served by dedicated handlers; the passthrough refuses them.
pub const RESERVED_PATHS: [&str; 3] = ["chat/completions", "embeddings", "models"];

/// Build the service→upstream credential. Independent of the caller's token.
fn upstream_headers(state: &AppState) -> GatewayResult<HeaderMap> {
    let token = state
        .config
        .upstream_token()
        .ok_or(GatewayError::MissingToken)?;
    let value = HeaderValue::from_str(&bearer(&token)).map_err(|_| GatewayError::MissingToken)?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn parse_json_body(body: &[u8]) -> GatewayResult<Value> {
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidBody(e.to_string()))
}

/// Parse an upstream body that must be JSON, keeping the upstream status.
fn json_passthrough(upstream: BufferedResponse) -> GatewayResult<Response> {
    let data: Value =
        serde_json::from_slice(&upstream.body).map_err(|_| GatewayError::BadUpstreamResponse)?;
    Ok((upstream.status, Json(data)).into_response())
}

fn finish(route: &'static str, start: Instant, result: GatewayResult<Response>) -> Response {
    let response = result.into_response();
    metrics::record_request(route, response.status().as_u16(), start);
    response
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// `GET /v1/models`
pub async fn list_models(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    finish("models", start, forward_models(&state).await)
}

async fn forward_models(state: &AppState) -> GatewayResult<Response> {
    let request = OutboundRequest::new(Method::GET, "/models", upstream_headers(state)?);
    json_passthrough(state.upstream.invoke(&request).await?)
}

/// `POST /v1/embeddings`
pub async fn embeddings(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    finish("embeddings", start, forward_embeddings(&state, &body).await)
}

async fn forward_embeddings(state: &AppState, body: &[u8]) -> GatewayResult<Response> {
    let body = parse_json_body(body)?;
    let request = OutboundRequest::new(Method::POST, "/embeddings", upstream_headers(state)?)
        .with_body(Some(body));
    json_passthrough(state.upstream.invoke(&request).await?)
}

/// `POST /v1/chat/completions`
///
/// `"stream": true` relays the upstream body live; anything else is buffered
/// and returned verbatim, error statuses included.
pub async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    finish("chat_completions", start, forward_chat(&state, &body).await)
}

async fn forward_chat(state: &AppState, body: &[u8]) -> GatewayResult<Response> {
    let body = parse_json_body(body)?;
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let request = OutboundRequest::new(Method::POST, "/chat/completions", upstream_headers(state)?)
        .with_body(Some(body));

    if stream {
        let relayed = state.upstream.invoke_streamed(&request).await?;
        tracing::debug!(status = %relayed.status, "Relaying upstream stream");
        Ok(relay_stream(relayed))
    } else {
        let upstream = state.upstream.invoke(&request).await?;
        Ok(relay_buffered(upstream, "application/json"))
    }
}

/// `{GET,POST,PUT,PATCH,DELETE} /v1/{*rest}`
///
/// Forwards any other sub-path. An unparsable body is forwarded as no body.
pub async fn passthrough(
    State(state): State<AppState>,
    method: Method,
    Path(rest): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    finish("passthrough", start, forward_passthrough(&state, method, rest, query, &body).await)
}

async fn forward_passthrough(
    state: &AppState,
    method: Method,
    rest: String,
    query: HashMap<String, String>,
    body: &[u8],
) -> GatewayResult<Response> {
    if RESERVED_PATHS.contains(&rest.as_str()) {
        return Err(GatewayError::ReservedPath(rest));
    }

    let headers = upstream_headers(state)?;
    let json_body = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(path = %rest, error = %e, "Dropping unparsable passthrough body");
                None
            }
        }
    };

    let request = OutboundRequest::new(method, format!("/{}", rest), headers)
        .with_query(query)
        .with_body(json_body);
    let upstream = state.upstream.invoke(&request).await?;
    Ok(relay_buffered(upstream, "application/octet-stream"))
}
