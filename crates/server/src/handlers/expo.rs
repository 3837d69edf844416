//! Expo device endpoint.

use crate::error::{ApiError, ApiResult};
use crate::multipart::expo_multipart_response;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;
use time::OffsetDateTime;
use updraft_core::version::normalize_runtime_version;
use updraft_core::{UpdateProtocol, UpdateStatus, DEFAULT_CHANNEL, RESOLUTION_CACHE_TTL};
use updraft_service::expo::resolution_cache_key;
use updraft_service::{CurrentUpdateFilter, ExpoUpdateResponse};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ExpoUpdateQuery {
    pub runtime_version: Option<String>,
    pub platform: Option<String>,
    pub current_update_id: Option<Uuid>,
}

/// Resolved request parameters. Query parameters win over their
/// `expo-…` header mirrors.
#[derive(Debug)]
struct ExpoUpdateParams {
    runtime_version: String,
    platform: String,
    current_update_id: Option<Uuid>,
    channel: String,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn parse_params(query: ExpoUpdateQuery, headers: &HeaderMap) -> ApiResult<ExpoUpdateParams> {
    let runtime_version = query
        .runtime_version
        .or_else(|| header_str(headers, "expo-runtime-version"))
        .ok_or_else(|| ApiError::validation("runtime_version", "runtime version is required"))?;
    let runtime_version = normalize_runtime_version(&runtime_version)
        .map_err(|_| ApiError::validation("runtime_version", "invalid runtime version"))?;

    let platform = query
        .platform
        .or_else(|| header_str(headers, "expo-platform"))
        .ok_or_else(|| ApiError::validation("platform", "platform is required"))?;

    let current_update_id = match query.current_update_id {
        Some(id) => Some(id),
        None => header_str(headers, "expo-current-update-id")
            .map(|raw| {
                Uuid::parse_str(&raw).map_err(|_| {
                    ApiError::validation("current_update_id", "invalid update id")
                })
            })
            .transpose()?,
    };

    Ok(ExpoUpdateParams {
        runtime_version,
        platform,
        current_update_id,
        channel: DEFAULT_CHANNEL.to_string(),
    })
}

/// GET /projects/{project_id}/expo
pub async fn get_expo_update(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ExpoUpdateQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let params = parse_params(query, &headers)?;
    tracing::debug!(
        project_id = %project_id,
        runtime_version = %params.runtime_version,
        platform = %params.platform,
        current_update_id = ?params.current_update_id,
        "expo update check"
    );

    let cache_key = resolution_cache_key(
        project_id,
        &params.channel,
        &params.runtime_version,
        &params.platform,
        params.current_update_id,
    );

    // Cache errors never fail the request.
    match state.cache.get(&cache_key).await {
        Ok(Some(cached)) => match serde_json::from_str::<ExpoUpdateResponse>(&cached) {
            Ok(response) => {
                tracing::debug!("found cached response");
                return expo_multipart_response(&response);
            }
            Err(e) => tracing::error!(error = %e, "failed to decode cached response"),
        },
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "failed to get cached response"),
    }

    let Some(project) = state.project_svc.project_by_id(project_id).await? else {
        return Err(ApiError::validation("project_id", "project not found"));
    };
    if project.update_protocol != UpdateProtocol::Expo.as_str() {
        return Err(ApiError::validation(
            "project_id",
            "project does not use Expo update protocol",
        ));
    }

    let result = state
        .update_svc
        .update_to_install(
            project_id,
            &params.runtime_version,
            &params.channel,
            &params.platform,
            &CurrentUpdateFilter {
                id: params.current_update_id,
                sha256: None,
            },
        )
        .await?;

    let response = match result {
        Some(row) if row.update.status == UpdateStatus::Published.as_str() => {
            let manifest = state
                .expo_svc
                .update_manifest(&row.update, &params.platform)
                .await?;
            ExpoUpdateResponse::manifest(&manifest)?
        }
        Some(row) if row.update.status == UpdateStatus::Canceled.as_str() => {
            ExpoUpdateResponse::roll_back_to_embedded(OffsetDateTime::now_utc())
        }
        _ => ExpoUpdateResponse::no_update_available(),
    };

    match serde_json::to_string(&response) {
        Ok(serialized) => {
            if let Err(e) = state
                .cache
                .set(&cache_key, &serialized, RESOLUTION_CACHE_TTL)
                .await
            {
                tracing::error!(error = %e, "failed to cache response");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to encode response for caching"),
    }

    expo_multipart_response(&response)
}
