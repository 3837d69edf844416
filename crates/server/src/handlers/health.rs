//! Health aggregation.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /healthz. Healthy only when every dependency answers.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state
        .store
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(format!("database unhealthy: {e}")))?;
    state
        .queue
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(format!("queue unhealthy: {e}")))?;

    Ok(Json(HealthResponse { status: "ok" }))
}
