//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → http/request.rs (request ID attached)
//!     → auth.rs (caller token vs. service secret; 401/403 short-circuit)
//!     → Pass to routing
//!
//! Outgoing upstream call:
//!     → credentials.rs (normalize the configured upstream token)
//!     → Authorization: Bearer <token>
//! ```
//!
//! # Design Decisions
//! - Caller and upstream credentials are never conflated
//! - Fail closed: reject on any credential check failure
//! - Tokens never appear in logs or error bodies

pub mod auth;
pub mod credentials;

pub use auth::{auth_gate, AuthGate};
pub use credentials::normalize_token;
