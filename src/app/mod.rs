//! Application layer containing settings, request instrumentation and shared state.

pub mod config;
pub mod instrumentation;
pub mod service;
pub mod state;

pub use config::Settings;
pub use instrumentation::{RequestContext, RequestInstrumentation, RequestTimer};
pub use service::AppService;
pub use state::AppState;
