//! crates/summary_player_core/src/session.rs
//!
//! Runs a `SessionCoordinator` on its own task. User actions and media feed ticks
//! are funnelled through one `select!` loop so all state changes happen in order
//! on a single task; the resulting state is published on a `watch` channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::coordinator::{SessionAction, SessionCoordinator, SessionInbox, SessionSnapshot};
use crate::player::PlayerOptions;
use crate::ports::{PlaybackEngine, SummarySource};

/// Returned when an action is sent to a session whose task has stopped.
#[derive(Debug, thiserror::Error)]
#[error("The session has ended")]
pub struct SessionClosed;

/// The presentation layer's handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    actions: mpsc::UnboundedSender<SessionAction>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn dispatch(&self, action: SessionAction) -> Result<(), SessionClosed> {
        self.actions.send(action).map_err(|_| SessionClosed)
    }

    /// A receiver that is notified whenever the session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Spawns a session task. It runs until every `SessionHandle` is dropped.
pub fn spawn_session(
    source: Arc<dyn SummarySource>,
    engine: Arc<dyn PlaybackEngine>,
    options: PlayerOptions,
) -> (SessionHandle, JoinHandle<()>) {
    let (coordinator, actions, inbox) = SessionCoordinator::new(source, engine, options);
    let (snapshots_tx, snapshots_rx) = watch::channel(coordinator.snapshot());
    let task = tokio::spawn(run(coordinator, inbox, snapshots_tx));
    let handle = SessionHandle {
        actions,
        snapshots: snapshots_rx,
    };
    (handle, task)
}

async fn run(
    mut coordinator: SessionCoordinator,
    mut inbox: SessionInbox,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    info!("Session started.");
    loop {
        tokio::select! {
            action = inbox.actions.recv() => match action {
                Some(action) => coordinator.dispatch(action),
                None => break,
            },
            Some(event) = inbox.feeds.recv() => coordinator.apply_feed(event),
        }

        let next = coordinator.snapshot();
        snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
    info!("Session ended.");
}
