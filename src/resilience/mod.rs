//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → transport (connect timeout, per-read timeout, pool slot wait)
//!     → On failure: retries.rs (classify, check attempt budget)
//!     → Retry immediately or surface 504
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Streams are never retried once opened
//! - Retry state lives on the stack of one call, never shared

pub mod retries;

pub use retries::{FailureKind, RetryPolicy};
