//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin gate, preflight, allow headers)
//!     → headers.rs (hardening response headers)
//!     → rate_limit.rs (per-IP window on API paths)
//!     → sanitize.rs (operator keys removed, markup escaped)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: rejected requests never reach a sub-router
//! - No trust in client input
//! - Limiter state is process-scoped and resets on restart

pub mod cors;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;
