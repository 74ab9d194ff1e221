//! Pooled upstream transport and the buffered invoker.
//!
//! One `UpstreamClient` exists per running gateway. It owns the reqwest
//! connection pool and a semaphore capping concurrent upstream exchanges.

use std::collections::HashMap;
use std::error::Error as _;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    Method, StatusCode,
};
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::resilience::{FailureKind, RetryPolicy};
use crate::upstream::relay::{self, RelayedStream};

/// A request to send upstream. Built fresh for every inbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path relative to the upstream base URL, e.g. `/models`.
    pub path: String,
    /// Carries exactly one `Authorization` entry.
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            query: HashMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// A single failed attempt, before the retry decision.
#[derive(Debug)]
struct AttemptError {
    kind: FailureKind,
    message: String,
}

impl AttemptError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        Self {
            kind: FailureKind::of(&err),
            message: error_chain(&err),
        }
    }
}

/// Render an error with its whole source chain; reqwest's top-level message
/// rarely names the actual cause.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Shared upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    slots: Arc<Semaphore>,
    config: Arc<GatewayConfig>,
    retry: RetryPolicy,
}

impl UpstreamClient {
    /// Build the pooled client from validated configuration.
    pub fn new(config: Arc<GatewayConfig>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect())
            .read_timeout(config.timeouts.read())
            .pool_max_idle_per_host(config.pool.max_idle_per_host);
        if !config.upstream.use_env_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        tracing::info!(
            base_url = %config.upstream.base_url,
            max_connections = config.pool.max_connections,
            max_idle_per_host = config.pool.max_idle_per_host,
            max_retries = config.retries.max_retries,
            "Upstream client ready"
        );

        Ok(Self {
            http,
            base_url: Arc::from(config.upstream.base_url.trim_end_matches('/')),
            slots: Arc::new(Semaphore::new(config.pool.max_connections)),
            retry: RetryPolicy::from_config(&config.retries),
            config,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue a buffered request, retrying connect and timeout failures.
    ///
    /// A non-success status from the upstream is a successful invocation.
    pub async fn invoke(&self, request: &OutboundRequest) -> GatewayResult<BufferedResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.attempt(request).await {
                Ok(response) => {
                    metrics::record_upstream_attempt("ok");
                    return Ok(response);
                }
                Err(error) => error,
            };

            if self.retry.should_retry(&request.method, error.kind, attempt) {
                metrics::record_upstream_attempt("retry");
                tracing::info!(
                    method = %request.method,
                    path = %request.path,
                    attempt,
                    error = %error.message,
                    "Retrying upstream request"
                );
                continue;
            }

            tracing::error!(
                method = %request.method,
                path = %request.path,
                attempt,
                error = %error.message,
                "Upstream request failed"
            );

            return Err(if error.kind.is_unreachable() {
                metrics::record_upstream_attempt("exhausted");
                GatewayError::UpstreamUnreachable {
                    context: "request",
                    attempts: attempt,
                    message: error.message,
                }
            } else {
                metrics::record_upstream_attempt("failed");
                GatewayError::UpstreamFailed(error.message)
            });
        }
    }

    /// Open a streamed request. Never retried: only the connection attempt
    /// can fail here, anything later ends the relayed body.
    pub async fn invoke_streamed(&self, request: &OutboundRequest) -> GatewayResult<RelayedStream> {
        let opened = async {
            let permit = self.acquire_slot().await?;
            let response = self
                .build(request)
                .send()
                .await
                .map_err(AttemptError::from_reqwest)?;
            Ok::<_, AttemptError>((permit, response))
        }
        .await;

        let (permit, response) = match opened {
            Ok(opened) => opened,
            Err(error) => {
                tracing::error!(path = %request.path, error = %error.message, "Upstream stream failed");
                return Err(if error.kind.is_unreachable() {
                    metrics::record_upstream_attempt("exhausted");
                    GatewayError::UpstreamUnreachable {
                        context: "stream",
                        attempts: 1,
                        message: error.message,
                    }
                } else {
                    metrics::record_upstream_attempt("failed");
                    GatewayError::UpstreamFailed(error.message)
                });
            }
        };
        metrics::record_upstream_attempt("ok");

        Ok(relay::spawn(response, permit, self.config.pool.stream_buffer))
    }

    async fn attempt(&self, request: &OutboundRequest) -> Result<BufferedResponse, AttemptError> {
        let _permit = self.acquire_slot().await?;

        let response = self
            .build(request)
            .send()
            .await
            .map_err(AttemptError::from_reqwest)?;

        let status = response.status();
        let content_type = content_type(response.headers());
        let body = response.bytes().await.map_err(AttemptError::from_reqwest)?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = %status,
            bytes = body.len(),
            "Upstream responded"
        );

        Ok(BufferedResponse {
            status,
            content_type,
            body,
        })
    }

    fn build(&self, request: &OutboundRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }

    /// Wait for a free upstream slot; waiting past the connect timeout counts
    /// as a connection failure.
    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, AttemptError> {
        let wait = self.config.timeouts.connect();
        match tokio::time::timeout(wait, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(AttemptError {
                kind: FailureKind::Other,
                message: "upstream client is shut down".to_string(),
            }),
            Err(_) => Err(AttemptError {
                kind: FailureKind::Connect,
                message: format!(
                    "timed out after {:?} waiting for one of {} upstream connection slots",
                    wait, self.config.pool.max_connections
                ),
            }),
        }
    }

    /// Stop handing out upstream slots. In-flight exchanges keep theirs.
    pub fn close(&self) {
        self.slots.close();
    }
}

pub(crate) fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
