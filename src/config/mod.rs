//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (optional, loaded into the process environment)
//! pds.toml / --config file
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to HttpServer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{resolve_config, resolve_config_with, ConfigError};
pub use schema::{
    AccessLogConfig, AppConfig, BodyConfig, CompressionConfig, CorsConfig, Environment,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig, TimeoutConfig,
};
