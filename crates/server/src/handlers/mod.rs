//! HTTP request handlers.

pub mod assets;
pub mod codepush;
pub mod expo;
pub mod health;
pub mod projects;
pub mod updates;

pub use assets::{get_asset, upload_asset};
pub use codepush::get_codepush_update;
pub use expo::get_expo_update;
pub use health::health_check;
pub use projects::{create_project, get_project};
pub use updates::{
    commit_update, get_update, get_updates, prepare_update, rollback_update,
};
