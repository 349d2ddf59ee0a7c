//! Security-related HTTP response headers.
//!
//! The default hardening set: CSP, cross-origin isolation, HSTS, MIME
//! sniffing and framing protection. Headers already set by a handler win.

use axum::{
    http::header::{HeaderName, HeaderValue},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';\
script-src 'self';script-src-attr 'none';style-src 'self' https: 'unsafe-inline';\
upgrade-insecure-requests";

/// The `(name, value)` pairs applied to every response.
pub fn security_header_values(config: &SecurityConfig) -> Vec<(HeaderName, HeaderValue)> {
    let hsts = HeaderValue::from_str(&format!(
        "max-age={}; includeSubDomains",
        config.hsts_max_age_secs
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("max-age=15552000; includeSubDomains"));

    vec![
        (
            HeaderName::from_static("content-security-policy"),
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("origin-agent-cluster"),
            HeaderValue::from_static("?1"),
        ),
        (
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ),
        (HeaderName::from_static("strict-transport-security"), hsts),
        (
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ),
        (
            HeaderName::from_static("x-dns-prefetch-control"),
            HeaderValue::from_static("off"),
        ),
        (
            HeaderName::from_static("x-download-options"),
            HeaderValue::from_static("noopen"),
        ),
        (
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("SAMEORIGIN"),
        ),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
        (
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("0"),
        ),
    ]
}

/// Apply the security header set to the provided router.
pub fn add_security_headers<S>(router: Router<S>, config: &SecurityConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if !config.enable_headers {
        return router;
    }

    security_header_values(config)
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(name, value))
        })
}
