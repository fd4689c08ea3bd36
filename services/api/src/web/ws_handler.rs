//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection gets its own session task and a remote playback engine backed by
//! the client's audio element.

use crate::{
    adapters::RemoteEngine,
    web::{
        protocol::{ClientMessage, Inbound, ServerMessage, SessionView},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use summary_player_core::{spawn_session, SessionHandle};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    let connection_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| {
        handle_socket(socket, app_state).instrument(info_span!("connection", id = %connection_id))
    })
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    let (engine, mut media_commands) = RemoteEngine::new();
    let engine = Arc::new(engine);
    let (session, session_task) = spawn_session(
        app_state.source.clone(),
        engine.clone(),
        app_state.config.player_options(),
    );
    let mut snapshots = session.subscribe();

    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initial View ---
    let initial = SessionView::from(&*snapshots.borrow_and_update());
    if !send_message(&mut sender, &ServerMessage::State(initial)).await {
        session_task.abort();
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Session task ended unexpectedly.");
                    break;
                }
                let view = SessionView::from(&*snapshots.borrow_and_update());
                if !send_message(&mut sender, &ServerMessage::State(view)).await {
                    break;
                }
            }
            Some(command) = media_commands.recv() => {
                if !send_message(&mut sender, &ServerMessage::Media { command }).await {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if !handle_text_message(text.as_str(), &session, &engine) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive failed: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
        }
    }

    // --- 3. Cleanup ---
    drop(session);
    session_task.abort();
    info!("WebSocket connection closed.");
}

/// Routes one client message. Returns `false` once the session can no longer accept input.
fn handle_text_message(text: &str, session: &SessionHandle, engine: &RemoteEngine) -> bool {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed client message: {}", e);
            return true;
        }
    };
    debug!(?message, "Client message received.");

    match Inbound::from(message) {
        Inbound::Action(action) => match session.dispatch(action) {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        },
        Inbound::Report { load_id, report } => {
            engine.report(load_id, report);
            true
        }
    }
}

/// Serializes and sends one message. Returns `false` if the socket is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    if let Err(e) = sender.send(Message::Text(json.into())).await {
        warn!("Failed to send message to client: {}", e);
        return false;
    }
    true
}
