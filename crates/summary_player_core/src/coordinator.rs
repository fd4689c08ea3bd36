//! crates/summary_player_core/src/coordinator.rs
//!
//! The session coordinator: the top-level reducer that owns the chapter cursor,
//! the active presentation mode and the error slot, and relays chapter changes
//! between the player and the reader.
//!
//! Relay edges are fixed:
//! - player `ChapterChanged` -> reader `ChapterChanged`
//! - reader `ChapterChanged` -> player `ChapterChanged`
//! - player `ErrorReceived`  -> error slot
//! - reader `ScrollDirectionChanged` -> toggle visibility

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cursor::ChapterCursor;
use crate::domain::Document;
use crate::player::{FeedEvent, PlayerAction, PlayerController, PlayerOptions, PlayerOutput, PlayerState};
use crate::ports::{PlaybackEngine, PortError, PortResult, SummarySource};
use crate::reader::{ReaderAction, ReaderController, ReaderOutput, ReaderState, ScrollDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationMode {
    #[default]
    Player,
    Reader,
}

impl PresentationMode {
    pub fn toggled(self) -> Self {
        match self {
            PresentationMode::Player => PresentationMode::Reader,
            PresentationMode::Reader => PresentationMode::Player,
        }
    }
}

/// Everything the presentation layer can ask of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Fetch (or re-fetch) the summary.
    Start,
    ToggleMode,
    DismissError,
    Player(PlayerAction),
    Reader(ReaderAction),
    /// Result of the fetch started by `Start`.
    SummaryFetched(PortResult<Document>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryHeader {
    pub title: String,
    pub author: String,
    pub cover_ref: String,
}

/// A copy of the whole session state, published after every change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub mode: PresentationMode,
    pub show_toggle: bool,
    pub is_fetching: bool,
    pub error: Option<PortError>,
    pub summary: Option<SummaryHeader>,
    pub player: PlayerState,
    pub reader: ReaderState,
}

/// Receiving ends of the two queues a coordinator consumes.
pub struct SessionInbox {
    pub actions: mpsc::UnboundedReceiver<SessionAction>,
    pub feeds: mpsc::UnboundedReceiver<FeedEvent>,
}

pub struct SessionCoordinator {
    source: Arc<dyn SummarySource>,
    cursor: ChapterCursor,
    player: PlayerController,
    reader: ReaderController,
    mode: PresentationMode,
    show_toggle: bool,
    is_fetching: bool,
    error: Option<PortError>,
    actions: mpsc::WeakUnboundedSender<SessionAction>,
}

impl SessionCoordinator {
    /// Builds a coordinator and the queues feeding it.
    ///
    /// The returned sender is the only strong handle to the action queue; once it
    /// and all of its clones are dropped the run loop ends.
    pub fn new(
        source: Arc<dyn SummarySource>,
        engine: Arc<dyn PlaybackEngine>,
        options: PlayerOptions,
    ) -> (Self, mpsc::UnboundedSender<SessionAction>, SessionInbox) {
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let (feeds_tx, feeds_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            source,
            cursor: ChapterCursor::new(),
            player: PlayerController::new(engine, options, feeds_tx),
            reader: ReaderController::new(),
            mode: PresentationMode::default(),
            show_toggle: true,
            is_fetching: false,
            error: None,
            actions: actions_tx.downgrade(),
        };
        let inbox = SessionInbox {
            actions: actions_rx,
            feeds: feeds_rx,
        };
        (coordinator, actions_tx, inbox)
    }

    pub fn cursor(&self) -> &ChapterCursor {
        &self.cursor
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            show_toggle: self.show_toggle,
            is_fetching: self.is_fetching,
            error: self.error.clone(),
            summary: self.cursor.document().map(|doc| SummaryHeader {
                title: doc.title.clone(),
                author: doc.author.full_name(),
                cover_ref: doc.cover_ref.clone(),
            }),
            player: self.player.state().clone(),
            reader: self.reader.state().clone(),
        }
    }

    /// Applies one action and every relay it triggers.
    pub fn dispatch(&mut self, action: SessionAction) {
        let mut pending = VecDeque::from([action]);
        while let Some(action) = pending.pop_front() {
            match action {
                SessionAction::Start => self.start(),
                SessionAction::ToggleMode => {
                    self.mode = self.mode.toggled();
                    debug!(mode = ?self.mode, "Presentation mode toggled.");
                }
                SessionAction::DismissError => self.error = None,
                SessionAction::SummaryFetched(result) => {
                    self.is_fetching = false;
                    match result {
                        Ok(document) => {
                            info!(
                                title = %document.title,
                                key_points = document.chapters.len(),
                                "Summary loaded."
                            );
                            self.cursor.load(document);
                            pending.push_back(SessionAction::Player(PlayerAction::ChapterChanged));
                            pending.push_back(SessionAction::Reader(ReaderAction::ChapterChanged));
                        }
                        Err(error) => {
                            warn!("Failed to fetch the summary: {}", error);
                            self.error = Some(error);
                        }
                    }
                }
                SessionAction::Player(action) => {
                    let outputs = self.player.handle(action, &mut self.cursor);
                    self.relay_player(outputs, &mut pending);
                }
                SessionAction::Reader(action) => {
                    let outputs = self.reader.handle(action, &mut self.cursor);
                    self.relay_reader(outputs, &mut pending);
                }
            }
        }
    }

    /// Applies one media feed tick and every relay it triggers.
    pub fn apply_feed(&mut self, event: FeedEvent) {
        let outputs = self.player.handle_feed(event, &mut self.cursor);
        let mut pending = VecDeque::new();
        self.relay_player(outputs, &mut pending);
        while let Some(action) = pending.pop_front() {
            self.dispatch(action);
        }
    }

    fn relay_player(&mut self, outputs: Vec<PlayerOutput>, pending: &mut VecDeque<SessionAction>) {
        for output in outputs {
            match output {
                PlayerOutput::ChapterChanged => {
                    pending.push_back(SessionAction::Reader(ReaderAction::ChapterChanged));
                }
                PlayerOutput::ErrorReceived(error) => self.error = Some(error),
            }
        }
    }

    fn relay_reader(&mut self, outputs: Vec<ReaderOutput>, pending: &mut VecDeque<SessionAction>) {
        for output in outputs {
            match output {
                ReaderOutput::ChapterChanged => {
                    pending.push_back(SessionAction::Player(PlayerAction::ChapterChanged));
                }
                ReaderOutput::ScrollDirectionChanged(ScrollDirection::Up) => self.show_toggle = true,
                ReaderOutput::ScrollDirectionChanged(ScrollDirection::Down) => {
                    // Only the reader scrolls, so the toggle stays put in player mode.
                    self.show_toggle = self.mode == PresentationMode::Player;
                }
            }
        }
    }

    fn start(&mut self) {
        if self.is_fetching {
            debug!("Summary fetch already in flight; ignoring start.");
            return;
        }
        let Some(actions) = self.actions.upgrade() else {
            return;
        };
        self.is_fetching = true;
        self.error = None;

        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let result = source.fetch_summary().await;
            if actions.send(SessionAction::SummaryFetched(result)).is_err() {
                debug!("Session ended before the summary arrived.");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_document, ScriptedEngine};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SummarySource for CountingSource {
        async fn fetch_summary(&self) -> PortResult<Document> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_document(3))
        }
    }

    struct Fixture {
        coordinator: SessionCoordinator,
        engine: Arc<ScriptedEngine>,
        source: Arc<CountingSource>,
        _actions: mpsc::UnboundedSender<SessionAction>,
        inbox: SessionInbox,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(ScriptedEngine::new());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (coordinator, actions, inbox) =
            SessionCoordinator::new(source.clone(), engine.clone(), PlayerOptions::default());
        Fixture {
            coordinator,
            engine,
            source,
            _actions: actions,
            inbox,
        }
    }

    fn loaded() -> Fixture {
        let mut fx = fixture();
        fx.coordinator
            .dispatch(SessionAction::SummaryFetched(Ok(sample_document(3))));
        fx
    }

    #[tokio::test]
    async fn test_loading_summary_syncs_both_controllers() {
        let fx = loaded();
        let snapshot = fx.coordinator.snapshot();
        assert_eq!(snapshot.player.book.key_point_title, "Chapter 1");
        assert_eq!(snapshot.reader.title, "Chapter 1");
        assert_eq!(
            snapshot.summary,
            Some(SummaryHeader {
                title: "Notes on the Analytical Engine".to_string(),
                author: "Ada Lovelace".to_string(),
                cover_ref: "https://example.com/cover.png".to_string(),
            })
        );
        assert_eq!(
            fx.engine.loaded().as_deref(),
            Some("https://example.com/audio/1.mp3")
        );
    }

    #[tokio::test]
    async fn test_player_skip_updates_hidden_reader() {
        let mut fx = loaded();
        fx.coordinator.dispatch(SessionAction::ToggleMode);
        assert_eq!(fx.coordinator.snapshot().mode, PresentationMode::Reader);

        fx.coordinator
            .dispatch(SessionAction::Player(PlayerAction::SkipForward));
        let snapshot = fx.coordinator.snapshot();
        assert_eq!(snapshot.reader.title, "Chapter 2");
        assert_eq!(snapshot.reader.text, "Text of chapter 2");
        assert_eq!(snapshot.player.book.key_point_title, "Chapter 2");
    }

    #[tokio::test]
    async fn test_reader_paging_rebinds_player() {
        let mut fx = loaded();
        fx.coordinator.dispatch(SessionAction::ToggleMode);
        fx.coordinator
            .dispatch(SessionAction::Reader(ReaderAction::PageForward));
        let snapshot = fx.coordinator.snapshot();
        assert_eq!(snapshot.player.book.key_point_label, "KEY POINT 2 OF 3");
        assert_eq!(snapshot.player.transport.position, 0.0);
        assert_eq!(
            fx.engine.loaded().as_deref(),
            Some("https://example.com/audio/2.mp3")
        );
    }

    #[tokio::test]
    async fn test_toggle_mode_keeps_cursor() {
        let mut fx = loaded();
        fx.coordinator
            .dispatch(SessionAction::Player(PlayerAction::SkipForward));
        fx.coordinator.dispatch(SessionAction::ToggleMode);
        fx.coordinator.dispatch(SessionAction::ToggleMode);
        assert_eq!(fx.coordinator.cursor().current_number(), Some(2));
        assert_eq!(fx.coordinator.snapshot().mode, PresentationMode::Player);
    }

    #[tokio::test]
    async fn test_fetch_failure_fills_error_slot() {
        let mut fx = fixture();
        fx.coordinator
            .dispatch(SessionAction::SummaryFetched(Err(PortError::ServerError(503))));
        assert_eq!(
            fx.coordinator.snapshot().error,
            Some(PortError::ServerError(503))
        );
        fx.coordinator.dispatch(SessionAction::DismissError);
        assert_eq!(fx.coordinator.snapshot().error, None);
    }

    #[tokio::test]
    async fn test_media_setup_failure_reaches_error_slot() {
        let mut fx = fixture();
        let mut document = sample_document(2);
        document.chapters[1].audio_ref = "::broken::".to_string();
        fx.coordinator
            .dispatch(SessionAction::SummaryFetched(Ok(document)));
        assert_eq!(fx.coordinator.snapshot().error, None);

        fx.coordinator
            .dispatch(SessionAction::Player(PlayerAction::SkipForward));
        let snapshot = fx.coordinator.snapshot();
        assert!(matches!(
            snapshot.error,
            Some(PortError::InvalidAudioSource(_))
        ));
        assert_eq!(snapshot.reader.title, "Chapter 2");
    }

    #[tokio::test]
    async fn test_scroll_direction_controls_toggle_in_reader() {
        let mut fx = loaded();
        let scrolled = |direction| SessionAction::Reader(ReaderAction::Scrolled(direction));

        fx.coordinator.dispatch(scrolled(ScrollDirection::Down));
        assert!(fx.coordinator.snapshot().show_toggle);

        fx.coordinator.dispatch(SessionAction::ToggleMode);
        fx.coordinator.dispatch(scrolled(ScrollDirection::Down));
        assert!(!fx.coordinator.snapshot().show_toggle);
        fx.coordinator.dispatch(scrolled(ScrollDirection::Up));
        assert!(fx.coordinator.snapshot().show_toggle);
    }

    #[tokio::test]
    async fn test_start_fetches_once_while_in_flight() {
        let mut fx = fixture();
        fx.coordinator.dispatch(SessionAction::Start);
        fx.coordinator.dispatch(SessionAction::Start);
        assert!(fx.coordinator.snapshot().is_fetching);

        let action = fx.inbox.actions.recv().await.unwrap();
        assert!(matches!(action, SessionAction::SummaryFetched(Ok(_))));
        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 1);

        fx.coordinator.dispatch(action);
        let snapshot = fx.coordinator.snapshot();
        assert!(!snapshot.is_fetching);
        assert_eq!(snapshot.reader.page_label, "1/3");
    }

    #[tokio::test]
    async fn test_completion_tick_relays_to_reader() {
        let mut fx = loaded();
        fx.coordinator
            .dispatch(SessionAction::Player(PlayerAction::PlayTapped));
        let generation = fx.coordinator.player.media().generation();
        fx.coordinator.apply_feed(FeedEvent {
            generation,
            tick: crate::player::FeedTick::Completed,
        });
        let snapshot = fx.coordinator.snapshot();
        assert_eq!(snapshot.reader.title, "Chapter 2");
        assert!(snapshot.player.transport.is_playing);
    }
}
