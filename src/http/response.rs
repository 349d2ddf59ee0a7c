//! Response finalization.
//!
//! The outermost stage. Every error response carries its [`AppError`] as an
//! extension; here the environment decides how much of an unclassified
//! failure the client gets to see.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::Environment;
use crate::error::AppError;

/// Middleware: stage 9, error policy.
pub async fn finalize_errors(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !environment.is_production() {
        return response;
    }

    match response.extensions().get::<AppError>() {
        Some(error @ AppError::Unclassified(_)) => {
            let error = error.clone();
            let (mut parts, _) = response.into_parts();
            // The replacement body is plain JSON of a different length.
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.remove(header::CONTENT_ENCODING);
            let body = Json(error.body(false)).into_response().into_body();
            Response::from_parts(parts, body)
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn failing() -> AppError {
        AppError::Unclassified("connection refused by 10.0.0.5".into())
    }

    fn app(environment: Environment) -> Router {
        Router::new()
            .route("/", get(failing))
            .layer(middleware::from_fn_with_state(environment, finalize_errors))
    }

    async fn body_of(environment: Environment) -> (StatusCode, String) {
        let response = app(environment)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_production_hides_detail() {
        let (status, body) = body_of(Environment::Production).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"status":"error","message":"Something went very wrong!"}"#);
    }

    #[tokio::test]
    async fn test_replaced_body_drops_encoding() {
        let app = Router::new()
            .route(
                "/",
                get(|| async {
                    let mut response = failing().await.into_response();
                    response
                        .headers_mut()
                        .insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
                    response
                }),
            )
            .layer(middleware::from_fn_with_state(
                Environment::Production,
                finalize_errors,
            ));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::CONTENT_ENCODING));
    }

    #[tokio::test]
    async fn test_development_shows_detail() {
        let (_, body) = body_of(Environment::Development).await;
        assert!(body.contains("connection refused by 10.0.0.5"));
    }
}
