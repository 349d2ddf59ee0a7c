//! Cross-origin policy stage.
//!
//! Two parts: [`enforce_origin`] rejects cross-origin requests from origins
//! outside the allow-list, then [`cors_layer`] answers preflights and adds
//! the `Access-Control-*` response headers for allowed origins.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::error::AppError;

/// Origin allow-list shared by the gate.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Arc<Vec<String>>,
}

impl OriginPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allowed: Arc::new(
                config
                    .allowed_origins
                    .iter()
                    .map(|o| normalize_origin(o))
                    .collect(),
            ),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.allowed.iter().any(|allowed| *allowed == origin)
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// True when the `Origin` header names the host the request was sent to.
///
/// Default ports are normalized, so `http://api.example` matches
/// `Host: api.example:80`.
pub fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return false;
    };
    let Ok(origin) = url::Url::parse(origin) else {
        return false;
    };
    // Read the Host under the origin's scheme to get the same default port.
    let Ok(target) = url::Url::parse(&format!("{}://{}", origin.scheme(), host.trim())) else {
        return false;
    };

    origin.host().is_some()
        && origin.host() == target.host()
        && origin.port_or_known_default() == target.port_or_known_default()
}

/// Middleware: stage 2a, origin gate.
pub async fn enforce_origin(
    State(policy): State<OriginPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    match origin {
        None => Ok(next.run(request).await),
        Some(origin) if policy.is_allowed(&origin) => Ok(next.run(request).await),
        Some(origin) if is_same_origin(&origin, request.headers()) => Ok(next.run(request).await),
        Some(origin) => {
            tracing::warn!(origin = %origin, "Cross-origin request rejected");
            Err(AppError::CorsRejected(format!(
                "Origin {} is not allowed by CORS policy",
                origin
            )))
        }
    }
}

/// Stage 2b: preflight handling and response headers for allowed origins.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim().trim_end_matches('/')).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(config.allow_credentials)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}
