//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::app::AppState;
use crate::domain::{ApiInfo, AppError, ErrorDetail, ErrorResponse, HealthResponse};
use crate::infra::metrics::CONTENT_TYPE;

/// Logical endpoint names used as the `endpoint` metric label.
pub const HEALTH_CHECK: &str = "health_check";
pub const API_INFO: &str = "api_info";

/// Health check
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.service.health_check())
}

/// API information
pub async fn api_info_handler(State(state): State<Arc<AppState>>) -> Json<ApiInfo> {
    Json(state.service.api_info())
}

/// Prometheus scrape endpoint.
///
/// Deliberately left out of request instrumentation so scrapes don't
/// create series about themselves.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    if !state.metrics_enabled {
        debug!("Metrics scrape rejected: metrics disabled");
        return (StatusCode::NOT_FOUND, "Metrics disabled").into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        state.registry.render(),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
