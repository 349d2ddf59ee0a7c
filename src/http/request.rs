//! Request-scoped guards applied before the pipeline stages.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// Upper bound on the time one request may spend in the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimeout(pub Duration);

/// Middleware: abandon the request once the timeout elapses.
///
/// Dropping the inner future cancels every stage that has not run yet.
pub async fn enforce_timeout(
    State(RequestTimeout(limit)): State<RequestTimeout>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    tokio::time::timeout(limit, next.run(request))
        .await
        .map_err(|_| {
            tracing::warn!(path = %path, timeout = ?limit, "Request timed out");
            AppError::Unclassified(format!("Request timed out after {}s", limit.as_secs()))
        })
}
