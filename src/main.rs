//! Authenticating API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                       GATEWAY                        │
//!                     │                                                      │
//!   Client Request    │  ┌──────────┐   ┌───────────┐   ┌────────────────┐   │
//!   ──────────────────┼─▶│request-id│──▶│ auth gate │──▶│ route handlers │   │
//!                     │  └──────────┘   └───────────┘   └───────┬────────┘   │
//!                     │                                         │            │
//!                     │                      buffered ┌─────────┴──────┐     │
//!                     │                    ┌──────────┤ upstream client├─────┼──▶ Upstream
//!                     │                    │ streamed └────────────────┘     │     API
//!                     │                    ▼                                 │
//!   Client Response   │             ┌─────────────┐                          │
//!   ◀─────────────────┼─────────────│ stream relay│                          │
//!                     │             └─────────────┘                          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use auth_gateway::config::{load_config, schema::ObservabilityConfig};
use auth_gateway::lifecycle::{signals, Shutdown};
use auth_gateway::observability::{logging, metrics};
use auth_gateway::Gateway;

#[derive(Parser)]
#[command(name = "auth-gateway", version, about = "Authenticating gateway for an OpenAI-compatible API")]
struct Args {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Refusing to start");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("auth-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        max_connections = config.pool.max_connections,
        max_retries = config.retries.max_retries,
        connect_timeout_secs = config.timeouts.connect_secs,
        read_timeout_secs = config.timeouts.read_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match serve(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: auth_gateway::GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind_address = config.listener.bind_address.clone();
    let gateway = Gateway::new(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_forwarder(shutdown.clone());

    gateway.run(listener, server_shutdown).await?;
    Ok(())
}
