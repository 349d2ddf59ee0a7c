//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after the pipeline stages)
//!     → router.rs (ordered prefix table lookup)
//!     → matcher.rs (segment-aware prefix match)
//!     → matched sub-router, or NotFound with the original URL
//!
//! Table construction (at startup):
//!     (prefix, sub-router)[] in registration order
//!     → Freeze as immutable Dispatcher
//! ```
//!
//! # Design Decisions
//! - Table built at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same mount
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{dispatch_handler, not_found, original_url, Dispatcher, Mount};
