//! Update lifecycle handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use updraft_core::object_key::validate_asset_path;
use updraft_core::version::normalize_runtime_version;
use updraft_core::{PrepareUpdateRequest, UploadUrl, MAX_OBJECT_SIZE};
use updraft_metadata::models::{ProjectRow, UpdateListFilter, UpdateRow};
use updraft_service::ServiceError;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct PrepareUpdateResponse {
    pub update_id: Uuid,
    pub upload_urls: Vec<UploadUrl>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub id: Uuid,
    pub runtime_version: String,
    pub channel: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
}

impl From<UpdateRow> for UpdateResponse {
    fn from(row: UpdateRow) -> Self {
        let created_at = row
            .created_at
            .to_offset(time::UtcOffset::UTC)
            .replace_nanosecond(0)
            .unwrap_or(row.created_at)
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            id: row.id,
            runtime_version: row.runtime_version,
            channel: row.channel,
            message: row.message.unwrap_or_default(),
            status: row.status,
            created_at,
        }
    }
}

async fn project_by_id(state: &AppState, project_id: Uuid) -> ApiResult<ProjectRow> {
    state
        .project_svc
        .project_by_id(project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("project not found".to_string()))
}

fn validate_file_metadata(request: &PrepareUpdateRequest) -> ApiResult<()> {
    for object in &request.file_metadata {
        if validate_asset_path(&object.path).is_err() {
            return Err(ApiError::validation("path", "invalid asset path"));
        }
        if object.content_type.is_empty() {
            return Err(ApiError::validation("content_type", "content type is required"));
        }
        if object.content_length == 0 || object.content_length > MAX_OBJECT_SIZE {
            return Err(ApiError::validation(
                "content_length",
                "content length must be between 1 byte and 100MB",
            ));
        }
    }
    Ok(())
}

/// POST /projects/{project_id}/updates
pub async fn prepare_update(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(mut request): Json<PrepareUpdateRequest>,
) -> ApiResult<(StatusCode, Json<PrepareUpdateResponse>)> {
    request.runtime_version = normalize_runtime_version(&request.runtime_version)
        .map_err(|_| ApiError::validation("runtime_version", "invalid runtime version"))?;
    validate_file_metadata(&request)?;

    let project = project_by_id(&state, project_id).await?;
    let (update_id, upload_urls) = state
        .update_svc
        .prepare_update(project.id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PrepareUpdateResponse {
            update_id,
            upload_urls,
        }),
    ))
}

/// POST /projects/{project_id}/updates/{update_id}/commit
pub async fn commit_update(
    State(state): State<AppState>,
    Path((project_id, update_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let project = project_by_id(&state, project_id).await?;
    state
        .update_svc
        .update_by_id(project.id, update_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("update not found".to_string()))?;

    state.update_svc.commit_update(update_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /projects/{project_id}/updates/{update_id}/rollback
pub async fn rollback_update(
    State(state): State<AppState>,
    Path((project_id, update_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    match state.update_svc.rollback_update(project_id, update_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(ServiceError::UpdateNotFound) => {
            tracing::debug!(update_id = %update_id, "update not found");
            Err(ApiError::validation("update_id", "update not found"))
        }
        Err(ServiceError::UpdateNotPublished) => {
            tracing::debug!(update_id = %update_id, "tried to rollback non-published update");
            Err(ApiError::validation("update_id", "update not published"))
        }
        Err(other) => Err(other.into()),
    }
}

/// GET /projects/{project_id}/updates/{update_id}
pub async fn get_update(
    State(state): State<AppState>,
    Path((project_id, update_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<UpdateResponse>> {
    let update = state
        .update_svc
        .update_by_id(project_id, update_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("update not found".to_string()))?;
    Ok(Json(update.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUpdatesQuery {
    pub status: Option<String>,
    pub runtime_version: Option<String>,
    pub channel: Option<String>,
}

/// GET /projects/{project_id}/updates
pub async fn get_updates(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListUpdatesQuery>,
) -> ApiResult<Json<Vec<UpdateResponse>>> {
    let project = project_by_id(&state, project_id).await?;

    let filter = UpdateListFilter {
        status: query.status,
        runtime_version: query.runtime_version,
        channel: query.channel,
    };
    let updates = state.update_svc.find_updates(project.id, &filter).await?;
    Ok(Json(updates.into_iter().map(Into::into).collect()))
}
