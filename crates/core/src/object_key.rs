//! Asset path validation and the storage object key grammar.
//!
//! Object keys come in two shapes:
//! - asset: `{project_id}/{update_id}/{clean_path}`
//! - archive: `{project_id}/archives/{update_id}/{platform}.zip`
//!
//! The second segment `archives` disambiguates the two.

use crate::error::{Error, Result};
use crate::update::Platform;
use crate::{MAX_ASSET_EXT_LEN, MAX_ASSET_PATH_LEN};
use uuid::Uuid;

/// Segment marking an archive object key.
const ARCHIVE_SEGMENT: &str = "archives";

/// Default extension for launch bundles whose path carries none.
pub const DEFAULT_BUNDLE_EXTENSION: &str = ".bundle";

/// Lexically normalize a client-supplied relative path: collapse empty
/// and `.` segments, resolve `..` against preceding segments.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Validate a client-supplied asset path: relative, non-empty basename,
/// no `..` anywhere in the directory portion.
pub fn validate_asset_path(path: &str) -> Result<()> {
    if path.is_empty() || path.len() > MAX_ASSET_PATH_LEN {
        return Err(Error::InvalidAssetPath(path.to_string()));
    }
    if path.starts_with('/') {
        return Err(Error::InvalidAssetPath(format!("absolute path: {path}")));
    }
    let (dir, file) = match path.rfind('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("", path),
    };
    if file.is_empty() {
        return Err(Error::InvalidAssetPath(format!("empty file name: {path}")));
    }
    if dir.contains("..") {
        return Err(Error::InvalidAssetPath(format!("path escapes root: {path}")));
    }
    Ok(())
}

/// Validate a client-supplied asset extension: a leading dot followed by
/// ASCII alphanumerics, dots or dashes.
pub fn validate_asset_ext(ext: &str) -> Result<()> {
    if ext.len() > MAX_ASSET_EXT_LEN {
        return Err(Error::InvalidAssetExtension(ext.to_string()));
    }
    let rest = ext
        .strip_prefix('.')
        .ok_or_else(|| Error::InvalidAssetExtension(ext.to_string()))?;
    if rest.is_empty()
        || !rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(Error::InvalidAssetExtension(ext.to_string()));
    }
    Ok(())
}

/// Extension of a launch bundle path, `.bundle` when it carries none.
pub fn bundle_extension(bundle_path: &str) -> String {
    let basename = bundle_path.rsplit('/').next().unwrap_or(bundle_path);
    match basename.rfind('.') {
        Some(idx) if idx + 1 < basename.len() => basename[idx..].to_string(),
        _ => DEFAULT_BUNDLE_EXTENSION.to_string(),
    }
}

/// Object key for an uploaded asset.
pub fn asset_object_key(project_id: Uuid, update_id: Uuid, path: &str) -> String {
    format!("{project_id}/{update_id}/{path}")
}

/// Object key for a per-platform CodePush archive.
pub fn archive_object_key(project_id: Uuid, update_id: Uuid, platform: Platform) -> String {
    format!("{project_id}/{ARCHIVE_SEGMENT}/{update_id}/{platform}.zip")
}

/// Split an asset object key into `(project_id, update_id, path)`.
///
/// The inverse of [`asset_object_key`] for the three-segment form.
pub fn asset_object_key_segments(key: &str) -> Result<(String, String, String)> {
    let mut it = key.splitn(3, '/');
    match (it.next(), it.next(), it.next()) {
        (Some(project), Some(update), Some(tail)) if !tail.is_empty() => Ok((
            project.to_string(),
            update.to_string(),
            tail.trim_start_matches('/').to_string(),
        )),
        _ => Err(Error::InvalidObjectKey(key.to_string())),
    }
}

/// Whether an object key addresses a per-platform archive.
pub fn is_archive_object_key(key: &str) -> bool {
    key.split('/').nth(1) == Some(ARCHIVE_SEGMENT)
}
