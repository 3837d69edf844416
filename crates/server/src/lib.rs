//! HTTP API server for the updraft OTA update server.
//!
//! This crate provides the HTTP control plane:
//! - Project creation and lookup
//! - Update prepare/commit/rollback/list
//! - Device-facing Expo manifest and CodePush update-check endpoints
//! - Local-mode signed asset upload/download under `/assets`
//! - Health aggregation

pub mod error;
pub mod handlers;
pub mod multipart;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
