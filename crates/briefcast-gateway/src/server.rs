//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use briefcast_core::traits::TaskRepository;
use briefcast_scheduler::Scheduler;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub repo: Arc<dyn TaskRepository>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/tasks", get(super::routes::list_tasks))
        .route("/api/v1/tasks/{id}/execute", post(super::routes::execute_task))
        .route("/api/v1/tasks/{id}/approve", post(super::routes::approve_task))
        .route("/api/v1/tasks/{id}/enable", post(super::routes::enable_task))
        .route("/api/v1/tasks/{id}/disable", post(super::routes::disable_task))
        .route(
            "/api/v1/tasks/{id}/executions",
            get(super::routes::list_executions),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::new(state))
}

/// Bind and serve until the process exits.
pub async fn serve(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, build_router(state)).await
}
