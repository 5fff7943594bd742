//! Domain layer containing core types and error definitions.

pub mod error;
pub mod types;

pub use error::{AppError, ConfigError, ConfigurationError, ObservationError};
pub use types::{ApiInfo, ErrorDetail, ErrorResponse, HealthResponse};
