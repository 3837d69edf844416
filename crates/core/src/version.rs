//! Runtime version normalization.

use crate::error::{Error, Result};
use semver::Version;

/// Normalize a runtime version through a strict semver parse.
///
/// Partial versions such as `1.2` are rejected; valid versions are
/// rendered back in canonical form (`01.2.3` never reaches storage).
pub fn normalize_runtime_version(raw: &str) -> Result<String> {
    let version = Version::parse(raw.trim())
        .map_err(|e| Error::InvalidRuntimeVersion(format!("{raw}: {e}")))?;
    Ok(version.to_string())
}
