//! Metric instruments and their text exposition.
//!
//! This module wraps the `prometheus` registry that backs the request
//! instrumentation and the `/metrics` endpoint.

pub mod registry;

pub use registry::{
    CONTENT_TYPE, Counter, DEFAULT_BUCKETS, Histogram, HistogramSnapshot, Labels, MetricRegistry,
};
