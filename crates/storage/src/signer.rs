//! HMAC URL signing for the local storage provider.
//!
//! Signed URLs route through the API process under `/assets`. The query
//! string carries the object key, method, expiry and an HMAC-SHA256
//! signature over all three, so the handler can recover and trust the
//! key without any session state.

use crate::error::{StorageError, StorageResult};
use crate::traits::{SignedUrlOptions, UrlMethod};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use percent_encoding::{NON_ALPHANUMERIC, percent_encode};
use rand::RngCore;
use sha2::Sha256;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Path under the API process where signed URLs resolve.
pub const ASSET_ENDPOINT_PATH: &str = "/assets";

const PARAM_KEY: &str = "obj";
const PARAM_METHOD: &str = "method";
const PARAM_EXPIRY: &str = "expiry";
const PARAM_CONTENT_TYPE: &str = "contentType";
const PARAM_SIGNATURE: &str = "signature";

/// Signs and verifies `/assets` URLs with a shared HMAC secret.
pub struct UrlSigner {
    base_url: Url,
    mac: HmacSha256,
}

impl UrlSigner {
    /// Build a signer rooted at `{api_public_url}/assets` with the secret
    /// read from `secret_key_path`.
    pub fn new(api_public_url: &str, secret_key_path: &Path) -> StorageResult<Self> {
        let mut base_url = Url::parse(api_public_url)
            .map_err(|e| StorageError::Internal(format!("invalid api_public_url: {e}")))?;
        let joined = format!(
            "{}{}",
            base_url.path().trim_end_matches('/'),
            ASSET_ENDPOINT_PATH
        );
        base_url.set_path(&joined);

        let secret = std::fs::read(secret_key_path)?;
        if secret.is_empty() {
            return Err(StorageError::Internal(format!(
                "secret key file is empty: {}",
                secret_key_path.display()
            )));
        }
        let mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| StorageError::Internal(format!("invalid secret key: {e}")))?;
        Ok(Self { base_url, mac })
    }

    /// Mint a signed URL authorizing `opts.method` on `key`.
    pub fn signed_url(&self, key: &str, opts: &SignedUrlOptions) -> StorageResult<String> {
        let expiry = unix_now()
            .checked_add(opts.expiry.as_secs())
            .ok_or_else(|| StorageError::Internal("expiry overflow".to_string()))?;
        let content_type = opts.content_type.as_deref().unwrap_or("");

        let signature = self.compute_signature(key, opts.method, expiry, content_type);

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(PARAM_KEY, key)
            .append_pair(PARAM_METHOD, opts.method.as_str())
            .append_pair(PARAM_EXPIRY, &expiry.to_string())
            .append_pair(PARAM_CONTENT_TYPE, content_type)
            .append_pair(PARAM_SIGNATURE, &signature);
        Ok(url.to_string())
    }

    /// Verify a request URL and recover the object key it addresses.
    ///
    /// Checks the signature, the bound method and the expiry.
    pub fn key_from_url(&self, url: &Url, method: UrlMethod) -> StorageResult<String> {
        let mut key = None;
        let mut url_method = None;
        let mut expiry = None;
        let mut content_type = String::new();
        let mut signature = None;

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                PARAM_KEY => key = Some(value.into_owned()),
                PARAM_METHOD => url_method = Some(value.into_owned()),
                PARAM_EXPIRY => expiry = Some(value.into_owned()),
                PARAM_CONTENT_TYPE => content_type = value.into_owned(),
                PARAM_SIGNATURE => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let key = key.ok_or_else(|| missing(PARAM_KEY))?;
        let url_method = url_method.ok_or_else(|| missing(PARAM_METHOD))?;
        let expiry = expiry
            .ok_or_else(|| missing(PARAM_EXPIRY))?
            .parse::<u64>()
            .map_err(|_| StorageError::InvalidSignature("malformed expiry".to_string()))?;
        let signature = signature.ok_or_else(|| missing(PARAM_SIGNATURE))?;

        if url_method != method.as_str() {
            return Err(StorageError::InvalidSignature(format!(
                "URL signed for {url_method}, used with {}",
                method.as_str()
            )));
        }

        let parsed_method = UrlMethod::parse(&url_method)
            .ok_or_else(|| StorageError::InvalidSignature("unknown method".to_string()))?;

        let provided = URL_SAFE_NO_PAD
            .decode(signature.as_bytes())
            .map_err(|_| StorageError::InvalidSignature("malformed signature".to_string()))?;
        let mut mac = self.mac();
        mac.update(canonical(&key, parsed_method, expiry, &content_type).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| StorageError::InvalidSignature("signature mismatch".to_string()))?;

        if expiry < unix_now() {
            return Err(StorageError::UrlExpired);
        }

        Ok(key)
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    fn compute_signature(
        &self,
        key: &str,
        method: UrlMethod,
        expiry: u64,
        content_type: &str,
    ) -> String {
        let mut mac = self.mac();
        mac.update(canonical(key, method, expiry, content_type).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

fn canonical(key: &str, method: UrlMethod, expiry: u64, content_type: &str) -> String {
    // Percent-encode the key so a crafted key can't collide with the
    // field separators.
    format!(
        "{}\n{}\n{}\n{}",
        percent_encode(key.as_bytes(), NON_ALPHANUMERIC),
        method.as_str(),
        expiry,
        content_type,
    )
}

fn missing(param: &str) -> StorageError {
    StorageError::InvalidSignature(format!("missing {param} parameter"))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Create the secret key file with 32 random bytes on first run.
///
/// Uses exclusive-create semantics: an existing file is left untouched,
/// so concurrent boots and restarts agree on one key.
pub fn ensure_secret_key_file(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);

    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            file.write_all(&key)?;
            tracing::info!(path = %path.display(), "generated secret key file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::info!(path = %path.display(), "found secret key file");
            Ok(())
        }
        Err(e) => Err(StorageError::Io(e)),
    }
}
