//! Multipart encoding of Expo device responses.

use crate::error::{ApiError, ApiResult};
use axum::http::{header, StatusCode};
use axum::response::Response;
use updraft_service::ExpoUpdateResponse;
use uuid::Uuid;

/// Wrap a responder payload in the one-part multipart body the Expo
/// updates protocol expects.
pub fn expo_multipart_response(update_response: &ExpoUpdateResponse) -> ApiResult<Response> {
    let boundary = format!("updraft-{}", Uuid::new_v4().simple());
    let payload = serde_json::to_string(&update_response.payload)
        .map_err(|e| ApiError::Internal(format!("failed to encode payload: {e}")))?;

    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name={part}\r\n\
         Content-Type: application/json\r\n\
         \r\n\
         {payload}\r\n\
         --{boundary}--\r\n",
        part = update_response.part_name,
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/mixed; boundary={boundary}"),
        )
        .header("expo-protocol-version", "1")
        .header("expo-sfv-version", "0")
        .header(header::CACHE_CONTROL, "private, max-age=0")
        .body(body.into())
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}
