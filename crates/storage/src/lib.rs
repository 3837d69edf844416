//! Blob storage for uploaded bundles and archives.
//!
//! Two providers share one [`ObjectStore`] trait: a filesystem backend
//! whose URLs are HMAC-signed and served by the API process, and an S3
//! backend with SDK-presigned URLs. The [`Storage`] facade on top owns
//! the upload policy (size caps, key construction, URL expiries).

pub mod backends;
pub mod error;
pub mod facade;
pub mod signer;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use facade::Storage;
pub use signer::{ensure_secret_key_file, UrlSigner};
pub use traits::{ByteStream, ObjectMeta, ObjectStore, SignedUrlOptions, UrlMethod};
