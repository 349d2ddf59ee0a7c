//! HTTP access log.
//!
//! Production appends Apache "combined" lines to a file through a single
//! writer task. Development prints the short "dev" format through `tracing`.
//! A failed write is reported and dropped; it never fails the request.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{header, HeaderMap, Method, Version},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{AccessLogConfig, Environment};
use crate::error::AppError;
use crate::observability::metrics;

/// Everything one log line needs, captured around the inner stages.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub remote_addr: Option<SocketAddr>,
    pub timestamp: DateTime<Utc>,
    pub method: Method,
    pub url: String,
    pub version: Version,
    pub status: u16,
    pub content_length: Option<u64>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub elapsed: Duration,
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

impl AccessRecord {
    /// `addr - - [date] "METHOD url HTTP/v" status length "referrer" "agent"`
    pub fn combined(&self) -> String {
        format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {} \"{}\" \"{}\"",
            self.remote_addr
                .map(|a| a.ip().to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.timestamp.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.url,
            version_str(self.version),
            self.status,
            self.content_length
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.referrer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }

    /// `METHOD url status 1.234 ms - length`
    pub fn dev(&self) -> String {
        format!(
            "{} {} {} {:.3} ms - {}",
            self.method,
            self.url,
            self.status,
            self.elapsed.as_secs_f64() * 1000.0,
            self.content_length
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
        )
    }
}

/// Where access lines go.
#[derive(Debug, Clone)]
pub enum AccessLog {
    /// Lines are sent to the file writer task.
    File(mpsc::UnboundedSender<String>),
    /// Lines are emitted as tracing events.
    Console,
}

/// Owns the writer task; awaiting it flushes the file once every sender is gone.
pub struct AccessLogWriter {
    handle: JoinHandle<()>,
}

impl AccessLogWriter {
    /// Wait until queued lines are written and the file is flushed.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Access log writer task failed");
        }
    }
}

impl AccessLog {
    /// Open the sink for the given environment.
    ///
    /// The file is opened once, in append mode, creating its directory.
    pub async fn open(
        environment: Environment,
        config: &AccessLogConfig,
    ) -> std::io::Result<(Self, Option<AccessLogWriter>)> {
        if !environment.is_production() {
            return Ok((AccessLog::Console, None));
        }

        let path = PathBuf::from(&config.path);
        let file = open_append(&path).await?;
        tracing::info!(path = %path.display(), "Access log opened");

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_lines(file, path, rx));
        Ok((AccessLog::File(tx), Some(AccessLogWriter { handle })))
    }

    /// Record one finished request.
    pub fn record(&self, record: &AccessRecord) {
        match self {
            AccessLog::File(tx) => {
                if tx.send(record.combined()).is_err() {
                    tracing::warn!("Access log writer is gone, dropping line");
                }
            }
            AccessLog::Console => tracing::info!(target: "access", "{}", record.dev()),
        }
    }
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

async fn write_lines(
    mut file: tokio::fs::File,
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = file.write_all(line.as_bytes()).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write access log line");
        }
    }

    if let Err(e) = file.flush().await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to flush access log");
    }
    tracing::debug!(path = %path.display(), "Access log closed");
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Middleware: stage 4, access logging and request metrics.
pub async fn log_access(State(log): State<AccessLog>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let timestamp = Utc::now();
    let method = request.method().clone();
    let version = request.version();
    let url = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.clone())
        .unwrap_or_else(|| request.uri().clone())
        .to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let referrer = header_string(request.headers(), header::REFERER);
    let user_agent = header_string(request.headers(), header::USER_AGENT);

    let response = next.run(request).await;

    let record = AccessRecord {
        remote_addr,
        timestamp,
        method,
        url,
        version,
        status: response.status().as_u16(),
        content_length: response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()),
        referrer,
        user_agent,
        elapsed: start.elapsed(),
    };
    log.record(&record);

    let error_kind = response.extensions().get::<AppError>().map(AppError::kind);
    metrics::record_request(record.method.as_str(), record.status, error_kind, start);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> AccessRecord {
        AccessRecord {
            remote_addr: Some(SocketAddr::from(([192, 168, 1, 20], 51234))),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
            method: Method::GET,
            url: "/api/users?page=2".to_string(),
            version: Version::HTTP_11,
            status: 200,
            content_length: Some(512),
            referrer: None,
            user_agent: Some("curl/8.0".to_string()),
            elapsed: Duration::from_micros(1500),
        }
    }

    #[test]
    fn test_combined_format() {
        assert_eq!(
            record().combined(),
            "192.168.1.20 - - [05/Mar/2024:14:07:09 +0000] \"GET /api/users?page=2 HTTP/1.1\" 200 512 \"-\" \"curl/8.0\""
        );
    }

    #[test]
    fn test_dev_format() {
        let mut r = record();
        r.content_length = None;
        assert_eq!(r.dev(), "GET /api/users?page=2 200 1.500 ms - -");
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("access.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "existing line\n").unwrap();

        let config = AccessLogConfig {
            path: path.to_string_lossy().into_owned(),
        };
        let (log, writer) = AccessLog::open(Environment::Production, &config).await.unwrap();
        log.record(&record());
        drop(log);
        writer.unwrap().finish().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].starts_with("192.168.1.20 - - ["));
    }

    #[tokio::test]
    async fn test_development_uses_console() {
        let (log, writer) = AccessLog::open(Environment::Development, &AccessLogConfig::default())
            .await
            .unwrap();
        assert!(matches!(log, AccessLog::Console));
        assert!(writer.is_none());
    }
}
