//! Application state shared across handlers.

use std::sync::Arc;
use updraft_cache::Cache;
use updraft_core::config::AppConfig;
use updraft_metadata::MetadataStore;
use updraft_queue::Connection;
use updraft_service::{CodePushService, ExpoService, ProjectService, UpdateService};
use updraft_storage::Storage;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub project_svc: ProjectService,
    pub update_svc: UpdateService,
    pub expo_svc: ExpoService,
    pub codepush_svc: CodePushService,
    pub storage: Storage,
    pub cache: Arc<dyn Cache>,
    pub store: Arc<dyn MetadataStore>,
    pub queue: Connection,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MetadataStore>,
        storage: Storage,
        queue: Connection,
        cache: Arc<dyn Cache>,
    ) -> Self {
        let project_svc = ProjectService::new(store.clone());
        let update_svc = UpdateService::new(
            store.clone(),
            storage.clone(),
            Arc::new(queue.clone()),
            cache.clone(),
        );
        let expo_svc = ExpoService::new(store.clone(), storage.clone());
        let codepush_svc = CodePushService::new(store.clone(), storage.clone());

        Self {
            config: Arc::new(config),
            project_svc,
            update_svc,
            expo_svc,
            codepush_svc,
            storage,
            cache,
            store,
            queue,
        }
    }
}
