//! Error classification and the centralized error translator.
//!
//! Every pipeline stage and every sub-router halts with an [`AppError`].
//! `IntoResponse for AppError` is the only place an error kind becomes an
//! HTTP status and the uniform `{status, message}` JSON body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message shown for unclassified failures when details are hidden.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went very wrong!";

/// Classified request failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("request entity too large")]
    PayloadTooLarge,

    #[error("{0}")]
    MalformedBody(String),

    #[error("{0}")]
    CorsRejected(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unclassified(String),
}

/// Discriminant of [`AppError`], used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PayloadTooLarge,
    MalformedBody,
    CorsRejected,
    TooManyRequests,
    NotFound,
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::MalformedBody => "malformed_body",
            ErrorKind::CorsRejected => "cors_rejected",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

/// Uniform JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl AppError {
    /// The fallback error for a URL no router claimed.
    pub fn route_not_found(original_url: &str) -> Self {
        AppError::NotFound(format!("Can't find {} on this server", original_url))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            AppError::MalformedBody(_) => ErrorKind::MalformedBody,
            AppError::CorsRejected(_) => ErrorKind::CorsRejected,
            AppError::TooManyRequests(_) => ErrorKind::TooManyRequests,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::CorsRejected(_) => StatusCode::FORBIDDEN,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the client-facing body.
    pub fn body(&self, expose_details: bool) -> ErrorBody {
        let status_code = self.status_code();
        let status = if status_code.is_client_error() { "fail" } else { "error" };
        let message = match self {
            AppError::Unclassified(_) if !expose_details => GENERIC_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        };
        ErrorBody { status, message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self, "Unhandled failure");
        } else {
            tracing::debug!(kind = self.kind().as_str(), error = %self, "Request rejected");
        }

        let body = self.body(true);
        let mut response = (status_code, Json(body)).into_response();
        // Outer stages (access log, error policy) inspect the attached error.
        response.extensions_mut().insert(self);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge,
            _ => AppError::MalformedBody(rejection.body_text()),
        }
    }
}

/// Render a caught handler panic as an unclassified failure.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    AppError::Unclassified(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_message() {
        let err = AppError::route_not_found("/foo/bar");
        let body = err.body(true);
        assert_eq!(body.status, "fail");
        assert_eq!(body.message, "Can't find /foo/bar on this server");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::PayloadTooLarge.status_code(), 413);
        assert_eq!(AppError::MalformedBody("x".into()).status_code(), 400);
        assert_eq!(AppError::CorsRejected("x".into()).status_code(), 403);
        assert_eq!(AppError::TooManyRequests("x".into()).status_code(), 429);
        assert_eq!(AppError::Unclassified("x".into()).status_code(), 500);
    }

    #[test]
    fn test_unclassified_detail_hidden() {
        let err = AppError::Unclassified("db connection reset".into());

        let hidden = err.body(false);
        assert_eq!(hidden.status, "error");
        assert_eq!(hidden.message, GENERIC_FAILURE_MESSAGE);

        let shown = err.body(true);
        assert_eq!(shown.message, "db connection reset");
    }

    #[test]
    fn test_response_carries_error() {
        let response = AppError::TooManyRequests("slow down".into()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.extensions().get::<AppError>().map(AppError::kind),
            Some(ErrorKind::TooManyRequests)
        );
    }

    #[test]
    fn test_panic_response_is_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
