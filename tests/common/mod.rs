//! Shared utilities for pipeline integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{Method, StatusCode},
    response::Response,
    routing,
    Json, Router,
};
use http_body_util::BodyExt;
use pds_backend::config::AppConfig;
use pds_backend::error::AppError;
use pds_backend::observability::AccessLog;
use pds_backend::routing::{not_found, Dispatcher};
use pds_backend::HttpServer;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Counts how many requests reached a sub-router.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sub-router that echoes what it received: path, query and JSON body.
pub fn echo_router(hits: HitCounter) -> Router {
    let get_hits = hits.clone();
    Router::new()
        .route(
            "/",
            routing::get(move |request: Request| {
                let hits = get_hits.clone();
                async move {
                    hits.hit();
                    Json(json!({
                        "path": request.uri().path(),
                        "query": request.uri().query(),
                    }))
                }
            })
            .post(move |body: Json<Value>| {
                let hits = hits.clone();
                async move {
                    hits.hit();
                    Json(json!({ "body": body.0 }))
                }
            }),
        )
        .route(
            "/large",
            routing::get(|| async { "x".repeat(4096) }),
        )
        .route(
            "/failure",
            routing::get(|| async { AppError::Unclassified("x".repeat(4000)) }),
        )
        .route(
            "/slow",
            routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        )
        .route(
            "/panic",
            routing::get(|| async {
                if true {
                    panic!("ledger invariant broken");
                }
                "unreachable"
            }),
        )
        .fallback(not_found)
}

/// Pipeline with an echo sub-router mounted at `/api/users`.
pub fn echo_app(config: AppConfig) -> (Router, HitCounter) {
    echo_app_with_log(config, AccessLog::Console)
}

pub fn echo_app_with_log(config: AppConfig, access_log: AccessLog) -> (Router, HitCounter) {
    let hits = HitCounter::default();
    let dispatcher = Dispatcher::new().mount("/api/users", echo_router(hits.clone()));
    let server = HttpServer::with_dispatcher(config, access_log, dispatcher);
    (server.router(), hits)
}

/// Pipeline with the default resource sub-routers.
pub fn default_app(config: AppConfig) -> Router {
    HttpServer::new(config, AccessLog::Console).router()
}

pub fn client_addr(last: u8) -> SocketAddr {
    SocketAddr::from(([198, 51, 100, last], 40000 + last as u16))
}

/// Build a request as the server would see it from `client`.
pub fn request(method: Method, uri: &str, client: SocketAddr, body: Option<Value>) -> Request {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "localhost:3000");

    let mut request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    request.extensions_mut().insert(ConnectInfo(client));
    request
}

pub async fn send(app: &Router, request: Request) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, client: SocketAddr) -> Response {
    send(app, request(Method::GET, uri, client, None)).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn expect_status(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
