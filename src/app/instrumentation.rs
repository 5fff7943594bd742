//! Request timing and outcome recording.
//!
//! Every measured call is bracketed by a [`RequestTimer`]. The timer records
//! exactly one counter increment and one histogram observation when it is
//! dropped, so the measurement fires on every exit path: normal return,
//! error, early return, panic or cancellation of the enclosing future.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::domain::{ConfigurationError, ObservationError};
use crate::infra::metrics::{Counter, DEFAULT_BUCKETS, Histogram, MetricRegistry};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Status recorded for a call that completed normally.
pub const SUCCESS_STATUS: u16 = 200;
/// Status recorded for a call that failed, panicked or was cancelled.
pub const FAILURE_STATUS: u16 = 500;

/// What routing knows about a request before the handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// HTTP method, e.g. `GET`
    pub method: String,
    /// Logical handler name. Never a raw path, to keep series bounded.
    pub endpoint: &'static str,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, endpoint: &'static str) -> Self {
        Self {
            method: method.into(),
            endpoint,
        }
    }
}

/// Records request counts and latencies into a [`MetricRegistry`].
#[derive(Debug, Clone)]
pub struct RequestInstrumentation {
    requests: Counter,
    duration: Histogram,
}

impl RequestInstrumentation {
    /// Register the HTTP instruments on `registry`.
    ///
    /// # Errors
    /// Fails if either name is already taken with a different shape.
    pub fn register(registry: &MetricRegistry) -> Result<Self, ConfigurationError> {
        let requests = registry.register_counter(
            REQUESTS_TOTAL,
            "Total number of requests",
            &["method", "endpoint", "status"],
        )?;
        let duration = registry.register_histogram(
            REQUEST_DURATION_SECONDS,
            "Request duration in seconds",
            &["method", "endpoint"],
            &DEFAULT_BUCKETS,
        )?;
        Ok(Self { requests, duration })
    }

    /// Start timing a request. Recording happens when the timer drops.
    pub fn start(&self, ctx: RequestContext) -> RequestTimer {
        RequestTimer {
            instrumentation: self.clone(),
            ctx,
            status: None,
            started: Instant::now(),
        }
    }

    /// Run `call`, recording 200 on `Ok` and 500 on `Err`.
    ///
    /// The result, including any error, is returned untouched.
    pub async fn observe<T, E, Fut>(&self, ctx: RequestContext, call: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let timer = self.start(ctx);
        let result = call.await;
        timer.finish(if result.is_ok() {
            SUCCESS_STATUS
        } else {
            FAILURE_STATUS
        });
        result
    }

    pub fn requests(&self) -> &Counter {
        &self.requests
    }

    pub fn duration(&self) -> &Histogram {
        &self.duration
    }

    fn record(
        &self,
        ctx: &RequestContext,
        status: u16,
        elapsed: Duration,
    ) -> Result<(), ObservationError> {
        let status = status.to_string();
        self.requests.increment(&[
            ("method", ctx.method.as_str()),
            ("endpoint", ctx.endpoint),
            ("status", status.as_str()),
        ])?;
        self.duration.observe(
            &[("method", ctx.method.as_str()), ("endpoint", ctx.endpoint)],
            elapsed.as_secs_f64(),
        )
    }
}

/// Scope guard for one measured request.
///
/// Call [`RequestTimer::finish`] with the outcome; a timer dropped without
/// one records [`FAILURE_STATUS`].
#[must_use = "dropping the timer records the request immediately"]
pub struct RequestTimer {
    instrumentation: RequestInstrumentation,
    ctx: RequestContext,
    status: Option<u16>,
    started: Instant,
}

impl RequestTimer {
    /// Set the outcome and record.
    pub fn finish(mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let status = self.status.unwrap_or(FAILURE_STATUS);

        match self.instrumentation.record(&self.ctx, status, elapsed) {
            Ok(()) => debug!(
                method = %self.ctx.method,
                endpoint = self.ctx.endpoint,
                status,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "Request recorded"
            ),
            Err(err) => error!(
                error = %err,
                endpoint = self.ctx.endpoint,
                "Failed to record request metrics"
            ),
        }
    }
}
