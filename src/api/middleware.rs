//! Per-handler request instrumentation for the API layer.
//!
//! [`instrumented`] wraps any axum handler in another handler with the same
//! extractors and response type. The wrapper times the call and records the
//! real request method, the given logical endpoint name and the status of the
//! response the inner handler produced. Errors are not touched: a handler
//! returning `Err(AppError)` has already been turned into its error response
//! by the time the wrapper sees it. Layers that can answer on the handler's
//! behalf, such as a timeout, belong on the inner handler so their status is
//! the one recorded.

use std::future::Future;
use std::pin::Pin;

use axum::{extract::Request, handler::Handler, response::Response};

use crate::app::{RequestContext, RequestInstrumentation};

/// A handler wrapped by [`instrumented`].
#[derive(Clone)]
pub struct Instrumented<H> {
    handler: H,
    endpoint: &'static str,
    instrumentation: RequestInstrumentation,
}

/// Wrap `handler` so every call is recorded under `endpoint`.
///
/// ```ignore
/// let route = get(instrumented("health_check", &state.instrumentation, health_check_handler));
/// ```
pub fn instrumented<H>(
    endpoint: &'static str,
    instrumentation: &RequestInstrumentation,
    handler: H,
) -> Instrumented<H> {
    Instrumented {
        handler,
        endpoint,
        instrumentation: instrumentation.clone(),
    }
}

impl<H, T, S> Handler<T, S> for Instrumented<H>
where
    H: Handler<T, S>,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, req: Request, state: S) -> Self::Future {
        let ctx = RequestContext::new(req.method().as_str(), self.endpoint);
        let timer = self.instrumentation.start(ctx);
        let inner = self.handler.call(req, state);

        Box::pin(async move {
            let response = inner.await;
            timer.finish(response.status().as_u16());
            response
        })
    }
}
