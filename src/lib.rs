// Library crate for xapi
// Exports modules for use by the server binary and tests

pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod storage;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    copy_request_info, create_advanced_config, delete_advanced_config, delete_request_info,
    get_advanced_config, get_request_history, list_advanced_configs, list_project_requests,
    save_request_info, send_request, update_advanced_config,
};
use crate::middlewares::auth_middleware;
use crate::state::AppState;

/// Build the application router with the given state
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        // Execution
        .route("/api/send-request", post(send_request))
        .route("/api/history/{request_info_id}", get(get_request_history))
        // Saved requests
        .route("/api/save-request-info", post(save_request_info))
        .route("/api/copy_request_info", post(copy_request_info))
        .route("/api/delete_request_info", post(delete_request_info))
        .route(
            "/api/projects/{project_id}/requests",
            get(list_project_requests),
        )
        // Pre-request configs
        .route("/api/advanced-config", post(create_advanced_config))
        .route("/api/advanced-config/list", get(list_advanced_configs))
        .route(
            "/api/advanced-config/{id}",
            get(get_advanced_config)
                .put(update_advanced_config)
                .delete(delete_advanced_config),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(|| async { "Hello, xapi!" }))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
