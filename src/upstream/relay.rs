//! Live relay of a streamed upstream body.
//!
//! # Data Flow
//! ```text
//! upstream socket → pump task ──bounded mpsc──▶ ReceiverStream → client body
//! ```
//!
//! The pump holds the upstream response and its connection slot. It stops as
//! soon as the receiving side is dropped (client went away), which drops the
//! upstream response and releases the connection.

use std::io;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use crate::observability::metrics::ActiveStream;
use crate::upstream::client::content_type;

/// Used when the upstream omits `Content-Type` on a streamed response.
pub const DEFAULT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// An open upstream stream: status and content type are known, the body is a
/// lazy, finite, non-restartable sequence of raw chunks.
#[derive(Debug)]
pub struct RelayedStream {
    pub status: StatusCode,
    pub content_type: String,
    pub chunks: ReceiverStream<Result<Bytes, io::Error>>,
}

/// Start pumping `response` into a bounded channel of `capacity` chunks.
pub(crate) fn spawn(
    response: reqwest::Response,
    permit: OwnedSemaphorePermit,
    capacity: usize,
) -> RelayedStream {
    let status = response.status();
    let content_type =
        content_type(response.headers()).unwrap_or_else(|| DEFAULT_STREAM_CONTENT_TYPE.to_string());
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(pump(response, tx, permit).in_current_span());

    RelayedStream {
        status,
        content_type,
        chunks: ReceiverStream::new(rx),
    }
}

async fn pump(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    _permit: OwnedSemaphorePermit,
) {
    let _active = ActiveStream::start();
    let mut upstream = response.bytes_stream();
    let mut relayed = 0usize;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                tracing::info!(relayed, "Caller disconnected, dropping upstream stream");
                return;
            }
            next = upstream.next() => match next {
                Some(Ok(chunk)) => {
                    relayed += chunk.len();
                    if tx.send(Ok(chunk)).await.is_err() {
                        tracing::info!(relayed, "Caller disconnected, dropping upstream stream");
                        return;
                    }
                }
                Some(Err(e)) => {
                    // Bytes may already be with the caller; abort the body rather than retry.
                    tracing::warn!(relayed, error = %e, "Upstream stream interrupted");
                    let _ = tx.send(Err(io::Error::other(e))).await;
                    return;
                }
                None => {
                    tracing::debug!(relayed, "Upstream stream finished");
                    return;
                }
            }
        }
    }
}
