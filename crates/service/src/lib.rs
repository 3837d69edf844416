//! Update lifecycle engine, asset ingestion worker and protocol responders.

pub mod codepush;
pub mod error;
pub mod expo;
pub mod processor;
pub mod project;
pub mod update;

pub use codepush::{parse_deployment_key, CodePushService, CodePushUpdate};
pub use error::{ServiceError, ServiceResult};
pub use expo::{ExpoService, ExpoUpdateResponse, Manifest, ManifestAsset};
pub use processor::Processor;
pub use project::ProjectService;
pub use update::{CurrentUpdateFilter, UpdateQueue, UpdateService};
