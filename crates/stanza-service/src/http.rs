//! HTTP registration boundary
//!
//! Modules that serve HTTP endpoints register axum method routers through
//! this trait. The listener owning the socket lives in the gateway.

use axum::routing::MethodRouter;

/// Accepts HTTP routes from modules before the listener starts serving
pub trait HttpRegistrar: Send + Sync {
    /// Mount `route` at `path` (axum path syntax, e.g. `/upload/:id/:filename`)
    fn register(&self, path: &str, route: MethodRouter) -> anyhow::Result<()>;
}
