//! HTTP server setup and pipeline assembly.
//!
//! # Responsibilities
//! - Create the Axum router with the ordered pipeline stages
//! - Own process-scoped state (rate-limit table, access log sink)
//! - Bind server to listener and serve until shutdown
//! - Start and stop background tasks (rate-limit sweeper)
//!
//! # Stage Order
//! ```text
//! request ─▶ error policy ─▶ request id / trace ─▶ 1 body parse ─▶ 2 CORS
//!         ─▶ 3 security headers ─▶ 4 access log ─▶ timeout ─▶ catch panic
//!         ─▶ 5 rate limit ─▶ 6 sanitize ─▶ 7 compression ─▶ 8 dispatch
//! ```
//! Axum applies `.layer` calls inside-out, so `build_router` adds them from
//! dispatch outwards.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::{
        predicate::{DefaultPredicate, Predicate, SizeAbove},
        CompressionLayer,
    },
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::panic_response;
use crate::http::body::{parse_json_body, BodyLimit};
use crate::http::request::{enforce_timeout, RequestTimeout};
use crate::http::response::finalize_errors;
use crate::observability::AccessLog;
use crate::resources;
use crate::routing::{dispatch_handler, Dispatcher};
use crate::security::cors::{cors_layer, enforce_origin, OriginPolicy};
use crate::security::headers::add_security_headers;
use crate::security::rate_limit::{run_sweeper, RateLimitLayerState, RateLimiterState};
use crate::security::sanitize::sanitize_request;

/// HTTP server for the backend.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    limiter: Arc<RateLimiterState>,
}

impl HttpServer {
    /// Create a server with the default resource sub-routers.
    pub fn new(config: AppConfig, access_log: AccessLog) -> Self {
        let dispatcher = resources::default_dispatcher(&resources::default_store());
        Self::with_dispatcher(config, access_log, dispatcher)
    }

    /// Create a server dispatching to the given sub-router table.
    pub fn with_dispatcher(config: AppConfig, access_log: AccessLog, dispatcher: Dispatcher) -> Self {
        let limiter = Arc::new(RateLimiterState::from_config(&config.rate_limit));
        let router = build_router(&config, access_log, limiter.clone(), dispatcher);
        Self {
            router,
            config,
            limiter,
        }
    }

    /// The assembled pipeline, for driving without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (sweeper_tx, _) = broadcast::channel(1);
        let sweeper = if self.config.rate_limit.enabled {
            Some(tokio::spawn(run_sweeper(
                self.limiter.clone(),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                sweeper_tx.subscribe(),
            )))
        } else {
            None
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        let _ = sweeper_tx.send(());
        if let Some(handle) = sweeper {
            let _ = handle.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Assemble the pipeline around the dispatcher.
pub fn build_router(
    config: &AppConfig,
    access_log: AccessLog,
    limiter: Arc<RateLimiterState>,
    dispatcher: Dispatcher,
) -> Router {
    // 8. Dispatch (fallback catches every path and method).
    let mut router = Router::new()
        .fallback(dispatch_handler)
        .with_state(Arc::new(dispatcher));

    // 7. Compression
    if config.compression.enabled {
        let predicate = DefaultPredicate::new().and(SizeAbove::new(config.compression.min_size_bytes));
        router = router.layer(CompressionLayer::new().compress_when(predicate));
    }

    // 6. Sanitization
    router = router.layer(middleware::from_fn(sanitize_request));

    // 5. Rate limiting
    if config.rate_limit.enabled {
        let state = RateLimitLayerState::new(limiter, &config.rate_limit);
        router = router.layer(middleware::from_fn_with_state(
            state,
            crate::security::rate_limit::rate_limit_middleware,
        ));
    }

    // Panics and timeouts become responses before the access log sees them.
    router = router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn_with_state(
                RequestTimeout(Duration::from_secs(config.timeouts.request_secs)),
                enforce_timeout,
            ))
            .layer(CatchPanicLayer::custom(panic_response)),
    );

    // 4. Access logging
    router = router.layer(middleware::from_fn_with_state(
        access_log,
        crate::observability::access_log::log_access,
    ));

    // 3. Security headers
    router = add_security_headers(router, &config.security);

    // 2. CORS: preflight/response headers, then the origin gate in front.
    router = router
        .layer(cors_layer(&config.cors))
        .layer(middleware::from_fn_with_state(
            OriginPolicy::new(&config.cors),
            enforce_origin,
        ));

    // 1. Body parse
    router = router.layer(middleware::from_fn_with_state(
        BodyLimit(config.body.limit_bytes),
        parse_json_body,
    ));

    router = router.layer(TraceLayer::new_for_http().make_span_with(
        |req: &axum::http::Request<axum::body::Body>| {
            let req_id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri(),
                req_id
            )
        },
    ));

    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        // 9. Error policy
        .layer(middleware::from_fn_with_state(config.environment, finalize_errors))
}
