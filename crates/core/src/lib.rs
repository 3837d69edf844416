//! Core domain types and shared logic for the updraft OTA update server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Project protocols and the update lifecycle states
//! - The client-supplied bundle `metadata.json` document
//! - Asset path validation and the storage object key grammar
//! - Runtime version normalization
//! - The CodePush package hash

pub mod bundle;
pub mod config;
pub mod error;
pub mod hash;
pub mod object_key;
pub mod package_hash;
pub mod update;
pub mod upload;
pub mod version;

pub use bundle::{AssetEntry, BundleMetadata, PlatformFiles};
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use update::{Platform, UpdateProtocol, UpdateStatus, PLATFORMS};
pub use upload::{PrepareUpdateRequest, StorageObject, UploadUrl};

use std::time::Duration;

/// Default release channel for updates that do not name one.
pub const DEFAULT_CHANNEL: &str = "production";

/// Maximum total size of one update's uploaded objects, in MiB.
pub const MAX_UPDATE_TOTAL_SIZE_MB: u64 = 100;

/// Maximum total size of one update's uploaded objects, in bytes.
pub const MAX_UPDATE_TOTAL_SIZE: u64 = MAX_UPDATE_TOTAL_SIZE_MB * 1024 * 1024;

/// Maximum size of a single uploaded object.
pub const MAX_OBJECT_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum length of a client-supplied asset path.
pub const MAX_ASSET_PATH_LEN: usize = 1024;

/// Maximum length of a client-supplied asset extension.
pub const MAX_ASSET_EXT_LEN: usize = 16;

/// Signed upload URLs expire after this long.
pub const UPLOAD_URL_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Signed download URLs expire after this long.
pub const DOWNLOAD_URL_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// Cached resolution responses expire after this long.
pub const RESOLUTION_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
