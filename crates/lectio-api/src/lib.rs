//! Axum HTTP API server.
//!
//! This crate provides:
//! - Range-aware streaming of stored audio objects
//! - Single-track signed playback/download URLs
//! - Bulk playlist manifests with a short-TTL cache
//! - Prometheus metrics, health and readiness probes

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use catalog::{Catalog, StaticCatalog};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
