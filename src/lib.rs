//! Request pipeline for the public distribution system backend.
//!
//! Requests pass a fixed sequence of stages (body parse, CORS, security
//! headers, access log, rate limit, sanitization, compression) before the
//! dispatcher hands them to the sub-router mounted for their `/api` prefix.
//! Any stage may halt with an [`AppError`], which becomes the uniform
//! `{status, message}` JSON response.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resources;
pub mod routing;
pub mod security;

pub use config::AppConfig;
pub use error::AppError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
