//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Own the upstream client for the lifetime of a running gateway
//! - Create the Axum Router with all handlers
//! - Compose middleware (trace, request ID, CORS, limits, Auth Gate)
//! - Serve until shutdown, then drain with a deadline

use std::future::IntoFuture;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::http::handlers::{chat_completions, embeddings, healthz, list_models, passthrough};
use crate::http::request::{stamp_request_id, RequestIdExt};
use crate::security::{auth_gate, AuthGate};
use crate::upstream::UpstreamClient;

/// Errors that stop the gateway from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub upstream: UpstreamClient,
}

/// A running gateway: configuration plus the one pooled upstream client.
///
/// The client lives exactly as long as this value and the handler states
/// cloned from it.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    upstream: UpstreamClient,
}

impl Gateway {
    /// Validate the configuration and create the pooled upstream client.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let config = Arc::new(config);
        let upstream = UpstreamClient::new(config.clone())?;
        Ok(Self { config, upstream })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            upstream: self.upstream.clone(),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// ```text
    /// request-id ─▶ trace ─▶ cors ─▶ timeout ─▶ body limit ─▶ auth gate ─▶ routes
    /// ```
    ///
    /// The gate wraps the whole router, so `/healthz` and unmatched paths are
    /// authenticated too.
    pub fn router(&self) -> Router {
        let gate = Arc::new(AuthGate::from_config(&self.config.auth));
        let ceiling = self.config.timeouts.request(self.config.retries.max_retries);

        let routes = Router::new()
            .route("/healthz", get(healthz))
            .route("/v1/models", get(list_models))
            .route("/v1/embeddings", post(embeddings))
            .route("/v1/chat/completions", post(chat_completions))
            .route(
                "/v1/{*rest}",
                get(passthrough)
                    .post(passthrough)
                    .put(passthrough)
                    .patch(passthrough)
                    .delete(passthrough),
            );

        let cors = if self.config.security.cors_allow_any_origin {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        };

        routes
            .with_state(self.state())
            .layer(middleware::from_fn_with_state(gate, auth_gate))
            .layer(DefaultBodyLimit::max(self.config.security.max_body_size))
            .layer(TimeoutLayer::with_status_code(StatusCode::GATEWAY_TIMEOUT, ceiling))
            .layer(cors)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request.request_id().map(|id| id.as_str()).unwrap_or("unknown"),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(middleware::from_fn(stamp_request_id))
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight
    /// requests for at most `timeouts.shutdown_grace_secs`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let grace = self.config.timeouts.shutdown_grace();
        let mut drain_started = shutdown.resubscribe();

        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining in-flight requests");
            })
            .into_future();
        let deadline = async move {
            let _ = drain_started.recv().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = server => result?,
            _ = deadline => {
                tracing::warn!(grace = ?grace, "Drain deadline exceeded, abandoning in-flight requests");
            }
        }

        self.upstream.close();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
