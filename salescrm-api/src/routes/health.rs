/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// Answers 200 with `status: "healthy"` while the database responds, and
/// 503 with `status: "degraded"` otherwise. Public; no token required.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use salescrm_shared::db::pool;
use serde::{Deserialize, Serialize};

use crate::{app::AppState, response::Envelope};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, database) = match pool::health_check(&state.db).await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    let healthy = status == StatusCode::OK;
    let body = Envelope {
        code: status.as_u16(),
        data: HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            version: salescrm_shared::VERSION.to_string(),
            database: database.to_string(),
        },
        message: if healthy { "Success" } else { "Database unavailable" }.to_string(),
        pagination: None,
    };

    (status, Json(body))
}
