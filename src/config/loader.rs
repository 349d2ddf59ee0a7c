//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the effective configuration from the process environment.
///
/// Reads `path` when given (or `pds.toml` when present), falls back to
/// defaults, then applies environment overrides and validates the result.
pub fn resolve_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    resolve_config_with(path, |key| std::env::var(key).ok())
}

/// [`resolve_config`] with an explicit environment lookup.
pub fn resolve_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_path = Path::new("pds.toml");
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None if default_path.exists() => read_config_file(default_path)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `NODE_ENV`, `PORT` and `CORS_ORIGIN` overrides.
///
/// `lookup` abstracts the process environment so overrides can be tested.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env) = lookup("NODE_ENV") {
        config.environment = Environment::from_name(&env);
    }

    if let Some(port) = lookup("PORT") {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port.trim());
    }

    if let Some(origins) = lookup("CORS_ORIGIN") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }
}
