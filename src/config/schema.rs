//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the backend.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment (switches log sink and error verbosity).
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// JSON body parsing limits.
    pub body: BodyConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Security response headers.
    pub security: SecurityConfig,

    /// Access log sink.
    pub access_log: AccessLogConfig,

    /// Per-IP rate limiting of API paths.
    pub rate_limit: RateLimitConfig,

    /// Response compression.
    pub compression: CompressionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment, read from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name. Anything other than `production` is development.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// JSON body parser limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum JSON body size in bytes.
    pub limit_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 10 * 1024, // 10kb
        }
    }
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to make credentialed cross-origin requests.
    pub allowed_origins: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://49.12.106.102".to_string()],
            allow_credentials: true,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Strict-Transport-Security max-age in seconds.
    pub hsts_max_age_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            hsts_max_age_secs: 15_552_000, // 180 days
        }
    }
}

/// Access log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Log file used in production, opened once in append mode.
    pub path: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            path: "logs/access.log".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Path prefix the limiter applies to.
    pub path_prefix: String,

    /// Maximum requests per client IP per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Message returned with 429 responses.
    pub message: String,

    /// Interval between sweeps of expired windows, in seconds.
    pub sweep_interval_secs: u64,

    /// Take the client IP from the first `X-Forwarded-For` entry.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: "/api".to_string(),
            max_requests: 100,
            window_secs: 15 * 60,
            message: "Too many requests from this IP. Try again later.".to_string(),
            sweep_interval_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

/// Response compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable response compression.
    pub enabled: bool,

    /// Responses smaller than this are sent uncompressed.
    pub min_size_bytes: u16,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size_bytes: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for draining in-flight requests at shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "pds_backend=debug,tower_http=debug".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.body.limit_bytes, 10240);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.rate_limit.path_prefix, "/api");
        assert_eq!(config.cors.allowed_origins, vec!["http://49.12.106.102"]);
        assert!(config.cors.allow_credentials);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            environment = "production"

            [rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert!(config.environment.is_production());
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn test_environment_names() {
        assert_eq!(Environment::from_name("production"), Environment::Production);
        assert_eq!(Environment::from_name("PRODUCTION "), Environment::Production);
        assert_eq!(Environment::from_name("staging"), Environment::Development);
        assert_eq!(Environment::from_name(""), Environment::Development);
    }
}
