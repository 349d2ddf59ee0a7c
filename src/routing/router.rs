//! Prefix dispatch to mounted sub-routers.
//!
//! # Responsibilities
//! - Store the ordered `(prefix → sub-router)` table
//! - Find the first mount whose prefix matches the request path
//! - Strip the prefix and hand the request to that sub-router
//! - Produce the not-found error when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc without locks)
//! - O(n) prefix scan in registration order; first match wins
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::Uri,
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceExt;

use crate::error::AppError;
use crate::routing::matcher::PathPrefixMatcher;

/// One registered sub-router.
#[derive(Debug, Clone)]
pub struct Mount {
    pub matcher: PathPrefixMatcher,
    pub router: Router,
}

/// Ordered dispatch table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    mounts: Vec<Mount>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `router` under `prefix`. Registration order is match order.
    pub fn mount(mut self, prefix: impl Into<String>, router: Router) -> Self {
        let matcher = PathPrefixMatcher::new(prefix);
        tracing::debug!(prefix = matcher.prefix(), "Mounted sub-router");
        self.mounts.push(Mount { matcher, router });
        self
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|m| m.matcher.prefix())
    }

    /// First mount matching `path`, with the path remainder.
    pub fn match_path<'a>(&self, path: &'a str) -> Option<(&Mount, &'a str)> {
        self.mounts
            .iter()
            .find_map(|mount| mount.matcher.strip(path).map(|rest| (mount, rest)))
    }

    /// Forward the request to its sub-router, or fail with `NotFound`.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let original_url = original_url(&request);

        let Some((mount, rest)) = self.match_path(request.uri().path()) else {
            tracing::debug!(url = %original_url, "No sub-router matched");
            return AppError::route_not_found(&original_url).into_response();
        };

        let forwarded = match request.uri().query() {
            Some(query) => format!("{}?{}", rest, query),
            None => rest.to_string(),
        };
        let router = mount.router.clone();

        match forwarded.parse::<Uri>() {
            Ok(uri) => *request.uri_mut() = uri,
            Err(e) => {
                return AppError::Unclassified(format!("Failed to forward {}: {}", original_url, e))
                    .into_response()
            }
        }

        match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// The URL as the client sent it (path and query).
pub fn original_url(request: &Request) -> String {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri)
        .unwrap_or_else(|| request.uri());

    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Handler: stage 8, dispatch. Installed as the fallback of the outer router.
pub async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
) -> Response {
    dispatcher.dispatch(request).await
}

/// Fallback for sub-routers: anything they do not handle is not found.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    AppError::route_not_found(&url)
}
