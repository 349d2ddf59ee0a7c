//! Per-IP fixed-window rate limiting for API paths.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::observability::metrics;
use crate::routing::matcher::PathPrefixMatcher;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// One client's counter within the current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's window resets.
    pub reset_after: Duration,
}

/// Counter table for the limiter. Created at startup, lost on restart.
pub struct RateLimiterState {
    windows: DashMap<IpAddr, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiterState {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Count a request from `client` at the current instant.
    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Count a request from `client` at `now`.
    ///
    /// The entry guard makes the read-modify-write atomic per client.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut entry = self.windows.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }

        entry.hits = entry.hits.saturating_add(1);
        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(entry.started));

        Decision {
            allowed: entry.hits <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.hits),
            reset_after,
        }
    }

    /// Drop windows that have fully elapsed. Returns the number removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before - self.windows.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Limiter plus its scope, handed to the middleware.
#[derive(Clone)]
pub struct RateLimitLayerState {
    pub limiter: Arc<RateLimiterState>,
    pub scope: PathPrefixMatcher,
    pub message: String,
    pub trust_forwarded_for: bool,
}

impl RateLimitLayerState {
    pub fn new(limiter: Arc<RateLimiterState>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            scope: PathPrefixMatcher::new(&config.path_prefix),
            message: config.message.clone(),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

/// Resolve the client address used as the limiter key.
pub fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn set_rate_headers(headers: &mut HeaderMap, decision: &Decision) {
    let reset_epoch = SystemTime::now()
        .checked_add(decision.reset_after)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or_default();

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_epoch));
}

/// Middleware: stage 5, rate limiting of API paths.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitLayerState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.scope.matches_path(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(client) = client_ip(&request, state.trust_forwarded_for) else {
        tracing::debug!("No client address available, skipping rate limit");
        return next.run(request).await;
    };

    let decision = state.limiter.check(client);

    if decision.allowed {
        let mut response = next.run(request).await;
        set_rate_headers(response.headers_mut(), &decision);
        response
    } else {
        tracing::warn!(client = %client, limit = decision.limit, "Rate limit exceeded");
        metrics::record_rate_limited();
        let mut response = AppError::TooManyRequests(state.message.clone()).into_response();
        set_rate_headers(response.headers_mut(), &decision);
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(decision.reset_after.as_secs().max(1)),
        );
        response
    }
}

/// Periodically evict elapsed windows until shutdown.
pub async fn run_sweeper(
    limiter: Arc<RateLimiterState>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep_at(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, tracked = limiter.tracked_clients(), "Swept rate limit windows");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate limit sweeper stopping");
                break;
            }
        }
    }
}
