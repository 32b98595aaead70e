use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/recordings", post(handlers::submit_recording))
        .route("/recordings/active", get(handlers::capture_progress))
        .route("/recordings/cancel", post(handlers::cancel_capture))
        // Pipeline queries
        .route("/pipeline/:bucket", get(handlers::refresh_pipeline))
        .route(
            "/pipeline/:bucket/:stage/:identity/url",
            get(handlers::access_url),
        )
        .route(
            "/pipeline/:bucket/:stage/:identity/content",
            get(handlers::read_content),
        )
        // Request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
