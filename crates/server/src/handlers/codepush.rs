//! CodePush device endpoint.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use updraft_core::version::normalize_runtime_version;
use updraft_core::UpdateProtocol;
use updraft_service::{parse_deployment_key, CodePushUpdate, CurrentUpdateFilter};

#[derive(Debug, Deserialize)]
pub struct UpdateCheckQuery {
    #[serde(rename = "deploymentKey")]
    pub deployment_key: String,
    #[serde(rename = "appVersion")]
    pub app_version: String,
    #[serde(rename = "packageHash")]
    pub package_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateCheckResponse {
    #[serde(rename = "updateInfo")]
    pub update_info: CodePushUpdate,
}

/// GET /codepush/update_check
pub async fn get_codepush_update(
    State(state): State<AppState>,
    Query(query): Query<UpdateCheckQuery>,
) -> ApiResult<Json<UpdateCheckResponse>> {
    let (project_id, platform, channel) = parse_deployment_key(&query.deployment_key)
        .map_err(|_| ApiError::validation("deployment_key", "invalid deployment key"))?;

    let app_version = normalize_runtime_version(&query.app_version)
        .map_err(|_| ApiError::validation("app_version", "invalid app version"))?;

    tracing::debug!(
        project_id = %project_id,
        platform = %platform,
        channel = %channel,
        app_version = %app_version,
        package_hash = ?query.package_hash,
        "codepush update check"
    );

    let Some(project) = state.project_svc.project_by_id(project_id).await? else {
        return Err(ApiError::validation("project_id", "project not found"));
    };
    if project.update_protocol != UpdateProtocol::Codepush.as_str() {
        return Err(ApiError::validation(
            "project_id",
            "project does not use CodePush update protocol",
        ));
    }

    let result = state
        .update_svc
        .update_to_install(
            project_id,
            &app_version,
            &channel,
            &platform,
            &CurrentUpdateFilter {
                id: None,
                sha256: query.package_hash,
            },
        )
        .await?;

    let update_info = match result {
        Some(row) => {
            state
                .codepush_svc
                .update_to_install(&row.update, &platform)
                .await?
        }
        None => CodePushUpdate::not_available(),
    };

    Ok(Json(UpdateCheckResponse { update_info }))
}
