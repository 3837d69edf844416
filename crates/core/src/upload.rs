//! Upload request/response types shared between the API and the services.

use serde::{Deserialize, Serialize};

/// A single object the client intends to upload for an update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageObject {
    /// Relative path of the file inside the bundle, as produced by the
    /// bundler. Validated against the asset path rules.
    pub path: String,
    /// Declared size in bytes. Counted against the update size cap.
    pub content_length: u64,
    /// MIME type the signed upload URL is bound to.
    pub content_type: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub md5_hash: String,
}

/// A minted upload URL for one object path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadUrl {
    pub path: String,
    pub url: String,
}

/// Body of the prepare-update request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareUpdateRequest {
    pub runtime_version: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub file_metadata: Vec<StorageObject>,
    /// Raw Expo app config, stored verbatim when supplied.
    #[serde(default)]
    pub expo_app_config: Option<serde_json::Value>,
}
