//! Project management.

use crate::error::ServiceResult;
use std::sync::Arc;
use updraft_core::UpdateProtocol;
use updraft_metadata::models::ProjectRow;
use updraft_metadata::MetadataStore;
use uuid::Uuid;

/// Create and look up projects.
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn MetadataStore>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn create_project(
        &self,
        name: &str,
        update_protocol: UpdateProtocol,
    ) -> ServiceResult<ProjectRow> {
        let project = self
            .store
            .create_project(Uuid::now_v7(), name, update_protocol)
            .await?;
        tracing::info!(project_id = %project.id, protocol = %update_protocol, "project created");
        Ok(project)
    }

    pub async fn project_by_id(&self, id: Uuid) -> ServiceResult<Option<ProjectRow>> {
        Ok(self.store.get_project(id).await?)
    }
}
