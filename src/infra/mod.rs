//! Infrastructure layer implementations.

pub mod metrics;
pub mod observability;

pub use metrics::{Counter, Histogram, MetricRegistry};
pub use observability::{LogFormat, init_tracing};
