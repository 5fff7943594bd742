//! HTTP routing configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, handler::Handler, http::StatusCode, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::app::AppState;

use super::handlers::{
    API_INFO, HEALTH_CHECK, api_info_handler, health_check_handler, metrics_handler,
};
use super::middleware::instrumented;

/// Requests running longer than this get 408 Request Timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the application router with the default request timeout.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    create_router_with_timeout(app_state, REQUEST_TIMEOUT)
}

/// Create the application router.
///
/// `/api/v1/*` handlers are instrumented; `/metrics` is not. The timeout
/// wraps each handler inside its instrumentation, so a timed-out request is
/// recorded with the 408 the client receives.
pub fn create_router_with_timeout(app_state: Arc<AppState>, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new().layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );
    let timeout = TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout);

    let instrumentation = &app_state.instrumentation;
    let health = get(instrumented(
        HEALTH_CHECK,
        instrumentation,
        health_check_handler.layer(timeout),
    ));
    let api_v1 = Router::new()
        .route(
            "/info",
            get(instrumented(
                API_INFO,
                instrumentation,
                api_info_handler.layer(timeout),
            )),
        )
        .route("/health", health.clone())
        .route("/health/", health);

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/metrics", get(metrics_handler.layer(timeout)))
        .layer(middleware)
        .with_state(app_state)
}
