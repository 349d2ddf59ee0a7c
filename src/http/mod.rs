//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, pipeline assembly)
//!     → request.rs (timeout guard)
//!     → body.rs (JSON body parse, size cap)
//!     → [security, observability stages]
//!     → [routing dispatch to a sub-router]
//!     → response.rs (error policy)
//!     → Send to client
//! ```

pub mod body;
pub mod request;
pub mod response;
pub mod server;

pub use body::ParsedBody;
pub use server::{build_router, HttpServer};
