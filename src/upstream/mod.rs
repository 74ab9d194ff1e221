//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! route handler
//!     → OutboundRequest (method, path, Authorization, query, JSON body)
//!     → client.rs  invoke()          → BufferedResponse   (retry on connect/timeout)
//!     → client.rs  invoke_streamed() → relay.rs RelayedStream (no retry)
//! ```

pub mod client;
pub mod relay;

pub use client::{BufferedResponse, OutboundRequest, UpstreamClient};
pub use relay::{RelayedStream, DEFAULT_STREAM_CONTENT_TYPE};
