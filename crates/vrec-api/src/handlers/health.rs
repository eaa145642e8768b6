//! Health check handlers.

use axum::Json;
use chrono::Utc;
use serde::Serialize;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct HealthcheckResponse {
    pub result: u8,
}

/// Load balancer probe; always `{"result": 1}` while the process serves.
pub async fn healthcheck() -> Json<HealthcheckResponse> {
    Json(HealthcheckResponse { result: 1 })
}
