//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use updraft_core::config::StorageProvider;
use updraft_core::MAX_OBJECT_SIZE;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Developer endpoints
        .route("/projects", post(handlers::create_project))
        .route("/projects/{project_id}", get(handlers::get_project))
        .route(
            "/projects/{project_id}/updates",
            post(handlers::prepare_update).get(handlers::get_updates),
        )
        .route(
            "/projects/{project_id}/updates/{update_id}",
            get(handlers::get_update),
        )
        .route(
            "/projects/{project_id}/updates/{update_id}/commit",
            post(handlers::commit_update),
        )
        .route(
            "/projects/{project_id}/updates/{update_id}/rollback",
            post(handlers::rollback_update),
        )
        // Device endpoints
        .route("/projects/{project_id}/expo", get(handlers::get_expo_update))
        .route("/codepush/update_check", get(handlers::get_codepush_update))
        // Health check (unauthenticated for load balancers and probes)
        .route("/healthz", get(handlers::health_check));

    // Signed asset URLs only resolve here for the local provider.
    if state.config.storage.provider() == StorageProvider::Local {
        router = router.route(
            "/assets",
            get(handlers::get_asset)
                .put(handlers::upload_asset)
                .layer(DefaultBodyLimit::max(MAX_OBJECT_SIZE as usize)),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
