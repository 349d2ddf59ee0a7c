//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → access_log.rs (one line per response: file or console)
//!     → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the trace span of every request
//! - Access log writes never fail a request
//! - Metrics are cheap and no-op without an exporter

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{AccessLog, AccessLogWriter, AccessRecord};
