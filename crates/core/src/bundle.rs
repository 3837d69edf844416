//! The client-supplied `metadata.json` describing an uploaded bundle.

use crate::error::{Error, Result};
use crate::object_key::{validate_asset_ext, validate_asset_path};
use crate::update::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One non-bundle asset referenced by the bundle metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetEntry {
    pub path: String,
    pub ext: String,
}

/// Per-platform file listing: the launch bundle plus its assets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformFiles {
    pub bundle: String,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

/// The `metadata.json` document a client uploads alongside its files.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub bundler: String,
    #[serde(default)]
    pub file_metadata: HashMap<String, PlatformFiles>,
}

impl BundleMetadata {
    /// Parse and validate a `metadata.json` payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let meta: Self = serde_json::from_slice(data)
            .map_err(|e| Error::InvalidBundleMetadata(e.to_string()))?;
        meta.validate()?;
        Ok(meta)
    }

    /// Validate every referenced path and extension.
    pub fn validate(&self) -> Result<()> {
        for (platform, files) in &self.file_metadata {
            if files.bundle.is_empty() {
                return Err(Error::InvalidBundleMetadata(format!(
                    "platform {platform}: bundle path is required"
                )));
            }
            validate_asset_path(&files.bundle)?;
            for asset in &files.assets {
                validate_asset_path(&asset.path)?;
                validate_asset_ext(&asset.ext)?;
            }
        }
        Ok(())
    }

    /// File listing for one platform, if the client bundled it.
    pub fn platform(&self, platform: Platform) -> Option<&PlatformFiles> {
        self.file_metadata.get(platform.as_str())
    }
}
