//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer composition)
//!     → request.rs (request ID attached, stamped on the way out)
//!     → security::auth (caller credential check, every path)
//!     → handlers.rs (build upstream credential, buffered vs. streamed)
//!     → response.rs (relay status, content type, body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, Gateway, ServerError};
