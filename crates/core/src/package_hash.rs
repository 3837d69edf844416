//! CodePush-compatible package hash.

use crate::error::{Error, Result};
use crate::hash::ContentHash;

/// Compute the package hash for a per-platform archive.
///
/// Tokens of the form `{path}:{sha256}` are sorted, JSON-encoded as a
/// string array and hashed with SHA-256. The result depends only on the
/// archive's logical content, never on zip encoding, so it stays stable
/// across compression runs. This matches the CodePush ecosystem
/// convention.
pub fn archive_package_hash<I, P, S>(entries: I) -> Result<String>
where
    I: IntoIterator<Item = (P, S)>,
    P: AsRef<str>,
    S: AsRef<str>,
{
    let mut tokens: Vec<String> = entries
        .into_iter()
        .map(|(path, sha256)| format!("{}:{}", path.as_ref(), sha256.as_ref()))
        .collect();
    tokens.sort_unstable();

    let encoded = serde_json::to_vec(&tokens).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(ContentHash::compute(&encoded).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<(String, String)> {
        vec![
            ("ios/assets/logo.png".to_string(), "aa11".to_string()),
            ("ios/main.jsbundle".to_string(), "bb22".to_string()),
            ("ios/assets/font.ttf".to_string(), "cc33".to_string()),
        ]
    }

    #[test]
    fn permutation_insensitive() {
        let forward = archive_package_hash(sample()).unwrap();
        let mut reversed = sample();
        reversed.reverse();
        assert_eq!(forward, archive_package_hash(reversed).unwrap());

        let mut rotated = sample();
        rotated.rotate_left(1);
        assert_eq!(forward, archive_package_hash(rotated).unwrap());
    }

    #[test]
    fn content_sensitive() {
        let baseline = archive_package_hash(sample()).unwrap();
        let mut changed = sample();
        changed[0].1 = "dd44".to_string();
        assert_ne!(baseline, archive_package_hash(changed).unwrap());

        let mut renamed = sample();
        renamed[0].0 = "ios/assets/logo2.png".to_string();
        assert_ne!(baseline, archive_package_hash(renamed).unwrap());
    }

    #[test]
    fn output_is_lowercase_hex() {
        let hash = archive_package_hash(sample()).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
