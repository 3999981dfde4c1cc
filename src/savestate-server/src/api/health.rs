//! Health check endpoint.

use axum::Json;

use crate::error::ApiResponse;

use super::types::HealthResponse;

pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(
        "healthy",
        HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    ))
}
