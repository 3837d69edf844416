//! Local-mode signed asset endpoints.
//!
//! Signed URLs minted by the local storage provider resolve here. The
//! HMAC signature in the query string is the only access control.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::Response;
use updraft_core::object_key::{asset_object_key_segments, clean_path, validate_asset_path};
use updraft_core::MAX_OBJECT_SIZE;
use updraft_storage::UrlMethod;
use url::Url;

fn request_url(uri: &Uri) -> ApiResult<Url> {
    // Only the query string matters for signature verification.
    Url::parse(&format!("http://localhost{uri}"))
        .map_err(|e| ApiError::Internal(format!("failed to parse request URL: {e}")))
}

fn verified_object_key(state: &AppState, uri: &Uri, method: UrlMethod) -> ApiResult<String> {
    let url = request_url(uri)?;
    state
        .storage
        .object_key_from_url(&url, method)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected asset URL");
            ApiError::Unauthorized("failed to get object key from URL".to_string())
        })
}

/// GET /assets: stream a stored object to the device.
pub async fn get_asset(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let object_key = verified_object_key(&state, request.uri(), UrlMethod::Get)?;

    let meta = state.storage.head(&object_key).await?;
    let stream = state.storage.get_stream(&object_key).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, meta.size);
    if let Some(content_type) = meta.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// PUT /assets: store a client upload under its signed object key.
pub async fn upload_asset(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let object_key = verified_object_key(&state, request.uri(), UrlMethod::Put)?;

    let (project_id, update_id, path) = asset_object_key_segments(&object_key)
        .map_err(|_| ApiError::validation("path", "invalid object key"))?;
    let path = clean_path(&path);
    validate_asset_path(&path).map_err(|_| ApiError::validation("path", "invalid asset path"))?;

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let data = axum::body::to_bytes(request.into_body(), MAX_OBJECT_SIZE as usize)
        .await
        .map_err(|_| {
            ApiError::validation("content_length", "object exceeds the 100MB limit")
        })?;
    if data.is_empty() {
        return Err(ApiError::validation("content_length", "empty object"));
    }

    tracing::debug!(
        object = %object_key,
        project_id = %project_id,
        update_id = %update_id,
        size = data.len(),
        "saving file to local storage"
    );
    state
        .storage
        .put(&object_key, data, content_type.as_deref())
        .await?;
    tracing::debug!(object = %object_key, "file saved to local storage");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("null"))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}
