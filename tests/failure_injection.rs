//! Failure injection: unreachable, slow and saturated upstreams.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

mod common;
use common::{config_for, dead_address, detail, request_id, start_upstream, TestGateway};

fn slow_upstream(calls: Arc<AtomicU32>, delay: Duration) -> Router {
    let handler = move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Json(json!({ "data": [] }))
        }
    };
    Router::new()
        .route("/v1/models", get(handler.clone()))
        .route("/v1/embeddings", post(handler))
}

#[tokio::test]
async fn unreachable_upstream_exhausts_retries() {
    let mut config = config_for(dead_address());
    config.retries.max_retries = 2;
    let gateway = TestGateway::start(config).await;

    let res = gateway.get("/v1/models").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(request_id(&res).is_some());
    let detail = detail(res).await;
    assert!(detail.starts_with("Upstream request failed after 3 attempt(s)"), "{detail}");
}

#[tokio::test]
async fn zero_retries_means_one_attempt() {
    let mut config = config_for(dead_address());
    config.retries.max_retries = 0;
    let gateway = TestGateway::start(config).await;

    let res = gateway
        .post("/v1/embeddings")
        .json(&json!({ "input": ["x"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(detail(res).await.contains("after 1 attempt(s)"));
}

#[tokio::test]
async fn unreachable_stream_is_not_retried() {
    let gateway = TestGateway::start(config_for(dead_address())).await;

    let res = gateway
        .post("/v1/chat/completions")
        .json(&json!({ "messages": [], "stream": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let detail = detail(res).await;
    assert!(detail.starts_with("Upstream stream failed after 1 attempt(s)"), "{detail}");
}

#[tokio::test]
async fn read_timeout_retries_idempotent_requests() {
    let calls = Arc::new(AtomicU32::new(0));
    let upstream = start_upstream(slow_upstream(calls.clone(), Duration::from_secs(3))).await;
    let mut config = config_for(upstream);
    config.timeouts.read_secs = 0.3;
    config.retries.max_retries = 2;
    let gateway = TestGateway::start(config).await;

    let res = gateway.get("/v1/models").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(detail(res).await.starts_with("Upstream request failed after 3 attempt(s)"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn hanging_upstream_gets_every_retry_before_the_request_ceiling() {
    let calls = Arc::new(AtomicU32::new(0));
    let upstream = start_upstream(slow_upstream(calls.clone(), Duration::from_secs(30))).await;
    let mut config = config_for(upstream);
    config.timeouts.connect_secs = 0.5;
    config.timeouts.read_secs = 0.5;
    config.timeouts.request_secs = Some(3.0);
    let gateway = TestGateway::start(config).await;

    let res = gateway.get("/v1/models").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(detail(res).await.contains("after 3 attempt(s)"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn request_ceiling_answers_gateway_timeout() {
    // Headers arrive at once and the body trickles in under the read timeout,
    // so only the request ceiling can end the exchange.
    let upstream = start_upstream(Router::new().route(
        "/v1/models",
        get(|| async {
            let trickle = futures_util::stream::unfold((), |()| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Some((Ok::<_, std::io::Error>(axum::body::Bytes::from_static(b" ")), ()))
            });
            axum::response::Response::new(axum::body::Body::from_stream(trickle))
        }),
    ))
    .await;
    let mut config = config_for(upstream);
    config.timeouts.connect_secs = 0.5;
    config.timeouts.read_secs = 0.5;
    config.timeouts.request_secs = Some(1.0);
    config.retries.max_retries = 0;
    let gateway = TestGateway::start(config).await;

    let res = gateway.get("/v1/models").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(request_id(&res).is_some());
}

#[tokio::test]
async fn read_timeout_does_not_replay_posts() {
    let calls = Arc::new(AtomicU32::new(0));
    let upstream = start_upstream(slow_upstream(calls.clone(), Duration::from_secs(3))).await;
    let mut config = config_for(upstream);
    config.timeouts.read_secs = 0.3;
    config.retries.max_retries = 2;
    let gateway = TestGateway::start(config).await;

    let res = gateway
        .post("/v1/embeddings")
        .json(&json!({ "input": ["x"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(detail(res).await.contains("after 1 attempt(s)"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_idempotent_replay_can_be_enabled() {
    let calls = Arc::new(AtomicU32::new(0));
    let upstream = start_upstream(slow_upstream(calls.clone(), Duration::from_secs(3))).await;
    let mut config = config_for(upstream);
    config.timeouts.read_secs = 0.3;
    config.retries.max_retries = 1;
    config.retries.retry_non_idempotent = true;
    let gateway = TestGateway::start(config).await;

    let res = gateway
        .post("/v1/embeddings")
        .json(&json!({ "input": ["x"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn saturated_pool_times_out_waiting_for_a_slot() {
    let calls = Arc::new(AtomicU32::new(0));
    let upstream = start_upstream(slow_upstream(calls.clone(), Duration::from_secs(2))).await;
    let mut config = config_for(upstream);
    config.pool.max_connections = 1;
    config.timeouts.connect_secs = 0.2;
    config.retries.max_retries = 0;
    let gateway = TestGateway::start(config).await;

    let holder = gateway.get("/v1/models").send();
    let waiter = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        gateway.get("/v1/models").send().await
    };
    let (held, waited) = tokio::join!(holder, waiter);

    assert_eq!(held.unwrap().status(), StatusCode::OK);
    let waited = waited.unwrap();
    assert_eq!(waited.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(detail(waited).await.contains("connection slots"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_requests_share_a_small_pool() {
    let calls = Arc::new(AtomicU32::new(0));
    let upstream =
        start_upstream(slow_upstream(calls.clone(), Duration::from_millis(20))).await;
    let mut config = config_for(upstream);
    config.pool.max_connections = 4;
    config.timeouts.connect_secs = 5.0;
    let gateway = TestGateway::start(config).await;

    let requests = (0..32).map(|_| gateway.get("/v1/models").send());
    let responses = futures_util::future::join_all(requests).await;

    for res in responses {
        assert_eq!(res.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 32);
}

#[tokio::test]
async fn shutdown_completes_the_server_task() {
    let upstream = start_upstream(Router::new()).await;
    let mut gateway = TestGateway::start(config_for(upstream)).await;

    let res = gateway.get("/healthz").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.shutdown.trigger();
    let handle = gateway.handle.take().unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop within the drain deadline")
        .unwrap();
}
