//! Project management handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use updraft_core::UpdateProtocol;
use updraft_metadata::models::ProjectRow;
use uuid::Uuid;

const MAX_PROJECT_NAME_LEN: usize = 512;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub update_protocol: UpdateProtocol,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub update_protocol: String,
}

impl From<ProjectRow> for ProjectResponse {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            update_protocol: row.update_protocol,
        }
    }
}

/// POST /projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    if request.name.is_empty() || request.name.len() > MAX_PROJECT_NAME_LEN {
        return Err(ApiError::validation("name", "name must be 1-512 characters"));
    }

    let project = state
        .project_svc
        .create_project(&request.name, request.update_protocol)
        .await?;
    Ok(Json(project.into()))
}

/// GET /projects/{project_id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = state
        .project_svc
        .project_by_id(project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("project not found".to_string()))?;
    Ok(Json(project.into()))
}
