//! The API layer, containing web handlers, routing and request instrumentation.

pub mod handlers;
pub mod middleware;
pub mod router;

pub use middleware::{Instrumented, instrumented};
pub use router::{create_router, create_router_with_timeout};
