//! Request Metrics API
//!
//! A small HTTP service whose handlers are wrapped by request
//! instrumentation, with the collected counters and histograms served in the
//! Prometheus text format at `GET /metrics`.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │   Handlers, routing, instrumented wrapper    │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  Settings, request timing, shared state      │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │            Response types, errors            │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │   Metric registry, exposition, logging       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Injected registry**: the `MetricRegistry` is built once at startup and
//!   passed to everything that records or renders; there is no global.
//! - **Every exit path measured**: a drop guard records each wrapped call
//!   whether it returns, fails, panics or is cancelled.
//! - **Bounded series**: requests are labelled by logical handler name, never
//!   by raw path.
//! - **Logging**: Structured logging with `tracing`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use request_metrics_api::api::create_router;
//! use request_metrics_api::app::{AppState, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let state = Arc::new(AppState::new(&settings)?);
//!
//!     let router = create_router(state);
//!     let listener = tokio::net::TcpListener::bind(settings.bind_address()).await?;
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;
