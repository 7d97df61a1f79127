//! HTTP API for modelplane
//!
//! Tenant-scoped endpoints over [`modelplane_lifecycle::LifecycleController`].
//! The caller's identity is the raw `Authorization` header value.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{router, start_server, AppState};
