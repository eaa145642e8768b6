//! Axum HTTP API server.
//!
//! This crate provides:
//! - Synchronous recognition of a base64-encoded video (`POST /process/`)
//! - Health endpoints for load balancers and orchestrators
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
