//! Shared utilities for gateway integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use auth_gateway::{Gateway, GatewayConfig, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Caller secret every test gateway is configured with.
pub const SERVICE_KEY: &str = "token123";

/// Upstream credential as configured (prefixed) and as it must arrive.
pub const UPSTREAM_KEY: &str = "sk-mytesttoken";
pub const UPSTREAM_AUTH: &str = "Bearer mytesttoken";

/// Serve `router` as a stub upstream on an ephemeral port.
pub async fn start_upstream(router: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing listens on.
pub fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gateway config pointing at `upstream` with short test timeouts.
pub fn config_for(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = format!("http://{}/v1", upstream);
    config.upstream.api_key = Some(UPSTREAM_KEY.into());
    config.upstream.use_env_proxy = false;
    config.auth.service_api_key = Some(SERVICE_KEY.into());
    config.timeouts.connect_secs = 1.0;
    config.timeouts.read_secs = 5.0;
    config.timeouts.shutdown_grace_secs = 1.0;
    config
}

/// A gateway serving on an ephemeral port; shuts down when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub shutdown: Shutdown,
    pub handle: Option<JoinHandle<()>>,
}

impl TestGateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let gateway = Gateway::new(config).expect("valid test config");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        let handle = tokio::spawn(async move {
            gateway.run(listener, server_shutdown).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap();

        Self {
            addr,
            client,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(SERVICE_KEY)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(SERVICE_KEY)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// The `detail` string of a gateway error body.
pub async fn detail(res: reqwest::Response) -> String {
    let body: serde_json::Value = res.json().await.unwrap();
    body["detail"].as_str().unwrap_or_default().to_string()
}

pub fn request_id(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
