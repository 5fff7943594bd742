//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::domain::ConfigurationError;
use crate::infra::MetricRegistry;

use super::config::Settings;
use super::instrumentation::RequestInstrumentation;
use super::service::AppService;

/// Shared application state for the Axum web server.
///
/// The metric registry is owned here and injected into everything that
/// records or renders; nothing reaches it through a global. A fresh state
/// therefore means a fresh set of instruments, which keeps tests isolated.
#[derive(Clone)]
pub struct AppState {
    /// The application service answering informational routes.
    pub service: Arc<AppService>,

    /// Every instrument in the process.
    pub registry: Arc<MetricRegistry>,

    /// Handles to the HTTP request instruments on `registry`.
    pub instrumentation: RequestInstrumentation,

    /// Copied from settings at startup; `GET /metrics` answers 404 when false.
    pub metrics_enabled: bool,
}

impl AppState {
    /// Creates state with a new registry.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the HTTP instruments can't be
    /// registered. Startup must abort in that case.
    pub fn new(settings: &Settings) -> Result<Self, ConfigurationError> {
        Self::with_registry(Arc::new(MetricRegistry::new()), settings.metrics_enabled)
    }

    /// Creates state around an existing registry.
    ///
    /// This is useful for tests that register extra instruments up front or
    /// inspect the registry directly.
    pub fn with_registry(
        registry: Arc<MetricRegistry>,
        metrics_enabled: bool,
    ) -> Result<Self, ConfigurationError> {
        let instrumentation = RequestInstrumentation::register(&registry)?;
        Ok(Self {
            service: Arc::new(AppService::default()),
            registry,
            instrumentation,
            metrics_enabled,
        })
    }
}
