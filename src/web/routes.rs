use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Generation
            .route("/generate", post(handlers::api::generate))
            .route("/validate", post(handlers::api::validate))
            .route("/examples", get(handlers::api::list_examples))
            // Saved projects
            .route(
                "/projects",
                get(handlers::api::list_projects).post(handlers::api::create_project),
            )
            .route(
                "/projects/{id}",
                get(handlers::api::get_project)
                    .put(handlers::api::update_project)
                    .delete(handlers::api::delete_project),
            )
            .route("/projects/{id}/favorite", post(handlers::api::set_favorite))
            .route("/projects/{id}/history", get(handlers::api::project_history))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
