use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{agents, health, tasks};
use super::AppState;

/// Builds the HTTP surface over a shared orchestrator
pub fn router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Agent routes
        .route("/agents", get(agents::list_agents).post(agents::register_agent))
        .route(
            "/agents/:agent_id",
            get(agents::get_agent).delete(agents::unregister_agent),
        )
        // Task routes
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/:task_id", get(tasks::get_task))
        .route("/tasks/:task_id/execute", post(tasks::execute_task))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Shared state
        .with_state(state)
}
