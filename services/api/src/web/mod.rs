pub mod protocol;
pub mod state;
pub mod ws_handler;

use std::sync::Arc;

use axum::{routing::get, Router};

use state::AppState;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use ws_handler::ws_handler;

/// Liveness probe.
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Builds the application routes. Layers such as CORS are added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
