//! HTTP API layer: router, middleware, endpoint handlers, and the
//! server lifecycle.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
