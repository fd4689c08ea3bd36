//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every connection.

use crate::config::Config;
use std::sync::Arc;
use summary_player_core::ports::SummarySource;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Per-connection state lives in the session task spawned by the WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<dyn SummarySource>,
}
