//! JSON body parsing stage.
//!
//! Mirrors a strict JSON body parser: only JSON content types are read,
//! the body is capped at the configured limit, an empty body becomes `{}`,
//! and only objects or arrays are accepted at the top level. The parsed
//! value is attached to the request as [`ParsedBody`] and the raw bytes are
//! put back so downstream extractors can still read them.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::error::AppError;

/// JSON body parsed by the first pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Body limit handed to the parsing stage.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// Returns true when the content type names JSON (`application/json` or `*/*+json`).
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Parse raw bytes under the strict rules.
pub fn parse_json(bytes: &[u8]) -> Result<Value, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::MalformedBody(format!("Invalid JSON body: {}", e)))?;

    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        _ => Err(AppError::MalformedBody(
            "JSON body must be an object or an array".to_string(),
        )),
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
            AppError::PayloadTooLarge
        } else {
            AppError::MalformedBody(format!("Failed to read request body: {}", inner))
        }
    })
}

/// Middleware: stage 1, body parse.
pub async fn parse_json_body(
    State(BodyLimit(limit)): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_json_content_type(request.headers()) {
        return Ok(next.run(request).await);
    }

    if declared_length(request.headers()).is_some_and(|len| len > limit) {
        return Err(AppError::PayloadTooLarge);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = read_limited(body, limit).await?;
    let value = parse_json(&bytes)?;

    parts.extensions.insert(ParsedBody(value));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type(&headers_with("application/json")));
        assert!(is_json_content_type(&headers_with("application/json; charset=utf-8")));
        assert!(is_json_content_type(&headers_with("application/vnd.api+json")));
        assert!(!is_json_content_type(&headers_with("multipart/form-data; boundary=x")));
        assert!(!is_json_content_type(&headers_with("text/plain")));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(parse_json(b"").unwrap(), json!({}));
        assert_eq!(parse_json(b"  \n").unwrap(), json!({}));
    }

    #[test]
    fn test_strict_top_level() {
        assert_eq!(parse_json(br#"[1,2]"#).unwrap(), json!([1, 2]));
        assert!(matches!(parse_json(b"42"), Err(AppError::MalformedBody(_))));
        assert!(matches!(parse_json(br#""str""#), Err(AppError::MalformedBody(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_json(b"{\"name\":"), Err(AppError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_read_limited_rejects_oversize() {
        let body = Body::from(vec![b'a'; 11]);
        assert_eq!(read_limited(body, 10).await, Err(AppError::PayloadTooLarge));

        let body = Body::from(vec![b'a'; 10]);
        assert_eq!(read_limited(body, 10).await.unwrap().len(), 10);
    }
}
