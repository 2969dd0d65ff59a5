//! Router construction for the docflow server.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use docflow_core::WorkflowEngine;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Build the full axum router with all routes and middleware.
pub fn build_router(engine: Arc<WorkflowEngine>) -> Router {
    let workflows = Router::new()
        // Templates
        .route(
            "/workflows/templates",
            get(handlers::templates::list_templates)
                .post(handlers::templates::save_template)
                .delete(handlers::templates::delete_template),
        )
        .route(
            "/workflows/templates/:id",
            get(handlers::templates::get_template),
        )
        // Processes
        .route(
            "/workflows",
            get(handlers::processes::list_processes)
                .post(handlers::processes::instantiate)
                .delete(handlers::processes::delete_process),
        )
        .route("/workflows/:id", get(handlers::processes::get_process))
        .route("/workflows/:id/pause", post(handlers::processes::pause_process))
        .route(
            "/workflows/:id/resume",
            post(handlers::processes::resume_process),
        )
        // Executions
        .route(
            "/workflows/:id/start",
            post(handlers::executions::start_execution),
        )
        .route(
            "/workflows/:id/executions",
            post(handlers::executions::advance).patch(handlers::executions::return_execution),
        )
        .route(
            "/workflows/:id/executions/:execution_id/actions",
            get(handlers::executions::available_actions),
        )
        // Compliance
        .route(
            "/workflows/:id/compliance",
            get(handlers::compliance::validate).post(handlers::compliance::enforce),
        )
        .route("/compliance", get(handlers::compliance::monitor))
        .route("/compliance/fix", post(handlers::compliance::fix_all));

    let public = Router::new().route("/health", get(handlers::health::health));

    public
        .merge(workflows)
        .layer(Extension(engine))
        .layer(TraceLayer::new_for_http())
}
