// src/handlers/health.rs

use axum::{Json, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Service banner listing the API roots.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Quiz Platform API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "quizzes": "/api/quizzes",
            "attempts": "/api/attempts",
            "health": "/api/health",
            "docs": "/swagger-ui",
        }
    }))
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = OK, body = HealthResponse)),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Quiz Platform API is running".to_string(),
    })
}

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
