//! Application service layer.
//!
//! Builds the payloads served by the API routes.

use tracing::debug;

use crate::domain::{ApiInfo, HealthResponse};

pub const API_NAME: &str = "Request Metrics API";
pub const API_DESCRIPTION: &str = "HTTP API with in-process request metrics";

/// Application service answering the informational routes.
#[derive(Debug, Clone)]
pub struct AppService {
    info: ApiInfo,
}

impl Default for AppService {
    fn default() -> Self {
        Self::new(ApiInfo::new(
            API_NAME,
            env!("CARGO_PKG_VERSION"),
            API_DESCRIPTION,
        ))
    }
}

impl AppService {
    #[must_use]
    pub fn new(info: ApiInfo) -> Self {
        Self { info }
    }

    /// Liveness report for the health route.
    pub fn health_check(&self) -> HealthResponse {
        debug!("Health check requested");
        HealthResponse::ok(&self.info.name)
    }

    pub fn api_info(&self) -> ApiInfo {
        self.info.clone()
    }
}
