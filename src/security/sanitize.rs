//! Input sanitization stage.
//!
//! Two passes over the parsed JSON body and the query string:
//! - operator injection: keys starting with `$` or containing `.` are removed
//! - script injection: `<` and `>` in keys and string values are HTML-escaped
//!
//! The sanitized body is written back as the request body, so sub-routers
//! never see the raw payload.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::http::body::ParsedBody;

/// Returns true for keys usable as query operators (`$gt`, `a.b`).
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Escape markup characters. Whitespace is left as sent.
pub fn clean_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Sanitize a JSON value in place. Returns true if anything changed.
pub fn sanitize_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => sanitize_map(map),
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| sanitize_value(item) | changed),
        Value::String(s) => {
            let cleaned = clean_text(s);
            if cleaned != *s {
                *s = cleaned;
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

fn sanitize_map(map: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    for (key, mut value) in std::mem::take(map) {
        if is_operator_key(&key) {
            changed = true;
            continue;
        }
        changed |= sanitize_value(&mut value);

        let cleaned = clean_text(&key);
        changed |= cleaned != key;
        map.insert(cleaned, value);
    }
    changed
}

/// Sanitize a raw query string. Returns `None` when nothing changed.
pub fn sanitize_query(query: &str) -> Option<String> {
    let mut changed = false;
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        // `filter[$ne]=x` is the bracketed form of an operator key.
        let key_is_operator = key
            .split(&['[', ']'][..])
            .filter(|segment| !segment.is_empty())
            .any(is_operator_key);
        if key_is_operator {
            changed = true;
            continue;
        }

        let cleaned_key = clean_text(&key);
        let cleaned = clean_text(&value);
        if cleaned_key != key || cleaned != value {
            changed = true;
        }
        serializer.append_pair(&cleaned_key, &cleaned);
    }

    changed.then(|| serializer.finish())
}

fn rewrite_query(uri: &Uri, query: &str) -> Option<Uri> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}

/// Middleware: stage 6, sanitization of body and query.
pub async fn sanitize_request(request: Request, next: Next) -> Response {
    let (mut parts, mut body) = request.into_parts();

    if let Some(query) = parts.uri.query() {
        if let Some(cleaned) = sanitize_query(query) {
            match rewrite_query(&parts.uri, &cleaned) {
                Some(uri) => {
                    tracing::debug!(path = %parts.uri.path(), "Sanitized query string");
                    parts.uri = uri;
                }
                None => tracing::warn!(path = %parts.uri.path(), "Could not rewrite sanitized query"),
            }
        }
    }

    if let Some(ParsedBody(value)) = parts.extensions.get_mut::<ParsedBody>() {
        if sanitize_value(value) {
            tracing::debug!(path = %parts.uri.path(), "Sanitized request body");
            match serde_json::to_vec(value) {
                Ok(bytes) => {
                    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                    body = Body::from(bytes);
                }
                Err(e) => tracing::warn!(error = %e, "Could not re-encode sanitized body"),
            }
        }
    }

    next.run(Request::from_parts(parts, body)).await
}
