//! Startup orchestration.
//!
//! Order: environment → config → logging → metrics → access log →
//! listener → serve. Any startup error is fatal. Shutdown reverses it:
//! stop accepting, drain, flush the access log.

use std::path::Path;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::{resolve_config, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::signals::spawn_signal_watcher;
use crate::lifecycle::Shutdown;
use crate::observability::{logging, metrics, AccessLog};

/// Fatal startup or serving failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open access log: {0}")]
    AccessLog(std::io::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Boot the backend and serve until a stop signal arrives.
pub async fn run(config_path: Option<&Path>) -> Result<(), StartupError> {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    let config = resolve_config(config_path)?;
    logging::init_logging(config.environment, &config.observability);

    tracing::info!(
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        allowed_origins = ?config.cors.allowed_origins,
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (access_log, log_writer) = AccessLog::open(config.environment, &config.access_log)
        .await
        .map_err(StartupError::AccessLog)?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_watcher(shutdown.clone());
    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);

    let server = HttpServer::new(config, access_log);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let served = tokio::select! {
        result = &mut server_task => result,
        _ = async {
            let mut stop = shutdown.subscribe();
            let _ = stop.recv().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(grace_secs = grace.as_secs(), "Drain deadline passed, aborting open connections");
            server_task.abort();
            Ok(Ok(()))
        }
    };
    signals.abort();

    // The router (and every access log sender) is gone once the server task ends.
    if let Some(writer) = log_writer {
        if tokio::time::timeout(grace, writer.finish()).await.is_err() {
            tracing::warn!("Access log did not close before the deadline");
        }
    }

    match served {
        Ok(result) => result.map_err(StartupError::Serve)?,
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::error!(error = %e, "Server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
