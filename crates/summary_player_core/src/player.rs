//! crates/summary_player_core/src/player.rs
//!
//! The player controller: transport state for the current key point.
//!
//! It owns the media session, rebuilds it whenever the current chapter changes and
//! turns the session's feeds into `FeedEvent`s on a queue consumed by the
//! coordinator. Feed ticks are applied only through `handle_feed`, never from the
//! feed task itself.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cursor::ChapterCursor;
use crate::media::{Feed, MediaSession, DEFAULT_POSITION_INTERVAL};
use crate::ports::{PlaybackEngine, PortError};
use crate::rate::PlaybackRate;

/// Tunables for the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    /// Seconds skipped by the "forward" jump button.
    pub seek_forward: f64,
    /// Seconds skipped by the "backward" jump button.
    pub seek_backward: f64,
    pub position_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            seek_forward: 10.0,
            seek_backward: 5.0,
            position_interval: DEFAULT_POSITION_INTERVAL,
        }
    }
}

//=========================================================================================
// State
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerPhase {
    /// Nothing is bound.
    #[default]
    Idle,
    /// A source is bound but its duration is not known yet.
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookView {
    pub cover_ref: Option<String>,
    pub key_point_title: String,
    pub key_point_label: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transport {
    /// What the engine is doing, not what was last asked of it.
    pub is_playing: bool,
    pub rate: PlaybackRate,
    pub position: f64,
    pub duration: f64,
}

impl Transport {
    pub fn position_label(&self) -> String {
        format_clock(self.position)
    }

    pub fn duration_label(&self) -> String {
        format_clock(self.duration)
    }
}

/// Formats seconds as `MM:SS`.
pub fn format_clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerState {
    pub phase: PlayerPhase,
    pub book: BookView,
    pub can_skip_backward: bool,
    pub can_skip_forward: bool,
    pub transport: Transport,
    /// Set while the user drags the seek slider; live position ticks are ignored.
    pub is_scrubbing: bool,
}

//=========================================================================================
// Actions and Outputs
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    PlayTapped,
    SkipForward,
    SkipBackward,
    SeekForward,
    SeekBackward,
    CycleRate,
    ScrubStarted,
    ScrubMoved(f64),
    ScrubFinished(f64),
    /// The current chapter was changed elsewhere; rebind without announcing.
    ChapterChanged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedTick {
    Position(f64),
    Duration(f64),
    Playing(bool),
    Completed,
}

/// A feed value stamped with the media generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedEvent {
    pub generation: u64,
    pub tick: FeedTick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerOutput {
    ChapterChanged,
    ErrorReceived(PortError),
}

//=========================================================================================
// Controller
//=========================================================================================

pub struct PlayerController {
    state: PlayerState,
    media: MediaSession,
    options: PlayerOptions,
    feed_events: mpsc::UnboundedSender<FeedEvent>,
    position_feed: Option<CancellationToken>,
    /// Whether playback resumes after a rebind. Survives stalls and failed setups.
    resume_on_rebind: bool,
}

impl PlayerController {
    pub fn new(
        engine: Arc<dyn PlaybackEngine>,
        options: PlayerOptions,
        feed_events: mpsc::UnboundedSender<FeedEvent>,
    ) -> Self {
        Self {
            state: PlayerState::default(),
            media: MediaSession::new(engine, options.position_interval),
            options,
            feed_events,
            position_feed: None,
            resume_on_rebind: false,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn media(&self) -> &MediaSession {
        &self.media
    }

    pub fn handle(&mut self, action: PlayerAction, cursor: &mut ChapterCursor) -> Vec<PlayerOutput> {
        match action {
            PlayerAction::PlayTapped => {
                if self.state.transport.is_playing {
                    self.pause();
                } else {
                    self.play();
                }
                Vec::new()
            }
            PlayerAction::SkipForward => {
                if cursor.advance() {
                    self.select_chapter(cursor, true)
                } else {
                    Vec::new()
                }
            }
            PlayerAction::SkipBackward => {
                if cursor.retreat() {
                    self.select_chapter(cursor, true)
                } else {
                    Vec::new()
                }
            }
            PlayerAction::SeekForward => {
                self.seek_by(self.options.seek_forward);
                Vec::new()
            }
            PlayerAction::SeekBackward => {
                self.seek_by(-self.options.seek_backward);
                Vec::new()
            }
            PlayerAction::CycleRate => {
                let rate = self.media.rate().next();
                self.media.set_rate(rate);
                self.state.transport.rate = rate;
                Vec::new()
            }
            PlayerAction::ScrubStarted => {
                self.state.is_scrubbing = true;
                Vec::new()
            }
            PlayerAction::ScrubMoved(seconds) => {
                if seconds.is_finite() {
                    self.state.transport.position = seconds;
                }
                Vec::new()
            }
            PlayerAction::ScrubFinished(seconds) => {
                if seconds.is_finite() {
                    let target = self.clamp_to_media(seconds);
                    self.media.seek(target);
                    self.state.transport.position = target;
                }
                self.state.is_scrubbing = false;
                Vec::new()
            }
            PlayerAction::ChapterChanged => self.select_chapter(cursor, false),
        }
    }

    /// Applies one tick from the media feeds. Ticks from a previous binding are dropped.
    pub fn handle_feed(&mut self, event: FeedEvent, cursor: &mut ChapterCursor) -> Vec<PlayerOutput> {
        if event.generation != self.media.generation() {
            trace!(
                stale = event.generation,
                current = self.media.generation(),
                "Dropping feed tick from a released source."
            );
            return Vec::new();
        }

        match event.tick {
            FeedTick::Position(seconds) => {
                if !self.state.is_scrubbing && seconds.is_finite() {
                    self.state.transport.position = seconds.max(0.0);
                }
                Vec::new()
            }
            FeedTick::Duration(seconds) => {
                self.state.transport.duration = seconds;
                if self.state.phase == PlayerPhase::Loading {
                    self.state.phase = PlayerPhase::Ready;
                }
                Vec::new()
            }
            FeedTick::Playing(playing) => {
                self.state.transport.is_playing = playing;
                if playing && self.position_feed.is_none() {
                    self.subscribe_position();
                }
                Vec::new()
            }
            FeedTick::Completed => self.playback_finished(cursor),
        }
    }

    fn play(&mut self) {
        if !self.media.is_bound() {
            debug!("Nothing to play.");
            return;
        }
        self.media.play();
        self.resume_on_rebind = true;
        self.state.transport.is_playing = true;
        self.subscribe_position();
    }

    fn pause(&mut self) {
        self.media.pause();
        self.resume_on_rebind = false;
        self.state.transport.is_playing = false;
    }

    fn playback_finished(&mut self, cursor: &mut ChapterCursor) -> Vec<PlayerOutput> {
        if cursor.is_last() {
            debug!("Last key point finished.");
            self.pause();
            Vec::new()
        } else {
            cursor.advance();
            debug!(key_point = ?cursor.current_number(), "Advancing to the next key point.");
            self.select_chapter(cursor, true)
        }
    }

    /// Rebinds the media session to the cursor's current chapter, keeping the
    /// play/pause intent that was active before.
    fn select_chapter(&mut self, cursor: &ChapterCursor, announce: bool) -> Vec<PlayerOutput> {
        self.refresh_book(cursor);

        let mut outputs = Vec::new();
        if announce {
            outputs.push(PlayerOutput::ChapterChanged);
        }

        self.position_feed = None;
        self.state.is_scrubbing = false;
        self.state.transport.is_playing = false;
        self.state.transport.position = 0.0;
        self.state.transport.duration = 0.0;

        let Some(chapter) = cursor.current() else {
            self.media.teardown();
            self.state.phase = PlayerPhase::Idle;
            return outputs;
        };

        match self.media.setup(&chapter.audio_ref) {
            Ok(generation) => {
                debug!(generation, key_point = ?cursor.current_number(), "Player bound to key point.");
                self.state.phase = PlayerPhase::Loading;
                self.forward(self.media.duration_feed(), FeedTick::Duration);
                self.forward(self.media.playing_feed(), FeedTick::Playing);
                self.forward(self.media.completion_feed(), |()| FeedTick::Completed);
                if self.resume_on_rebind {
                    self.play();
                } else {
                    self.pause();
                }
            }
            Err(error) => {
                warn!("Failed to set up the player: {}", error);
                self.state.phase = PlayerPhase::Idle;
                outputs.push(PlayerOutput::ErrorReceived(error));
            }
        }
        outputs
    }

    fn refresh_book(&mut self, cursor: &ChapterCursor) {
        let cover_ref = cursor
            .cover_ref()
            .filter(|cover| !cover.trim().is_empty())
            .map(str::to_string);

        let (Some(number), Some(chapter)) = (cursor.current_number(), cursor.current()) else {
            self.state.book = BookView {
                cover_ref,
                ..BookView::default()
            };
            self.state.can_skip_backward = false;
            self.state.can_skip_forward = false;
            return;
        };

        self.state.book = BookView {
            cover_ref,
            key_point_title: chapter.title.clone(),
            key_point_label: format!("KEY POINT {} OF {}", number, cursor.count()),
        };
        self.state.can_skip_backward = !cursor.is_first();
        self.state.can_skip_forward = !cursor.is_last();
    }

    fn subscribe_position(&mut self) {
        if !self.media.is_bound() {
            return;
        }
        if let Some(previous) = self.position_feed.take() {
            previous.cancel();
        }
        let feed = self.media.position_feed();
        self.position_feed = Some(feed.cancel_handle());
        self.forward(feed, FeedTick::Position);
    }

    /// Pumps a feed into the controller's event queue until it ends.
    fn forward<T: Send + 'static>(&self, feed: Feed<T>, tick: fn(T) -> FeedTick) {
        let events = self.feed_events.clone();
        let generation = feed.generation();
        tokio::spawn(async move {
            let mut feed = feed;
            while let Some(value) = feed.next().await {
                let event = FeedEvent {
                    generation,
                    tick: tick(value),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        });
    }

    /// Jumps relative to the displayed position, clamped to `[0, duration]`.
    ///
    /// While the duration is unknown the upper bound is the current position,
    /// so only backward jumps have an effect.
    fn seek_by(&mut self, delta: f64) {
        if !self.media.is_bound() {
            return;
        }
        let transport = &self.state.transport;
        let upper = if transport.duration > 0.0 {
            transport.duration
        } else {
            transport.position.max(0.0)
        };
        let target = (transport.position + delta).clamp(0.0, upper);
        self.media.seek(target);
        self.state.transport.position = target;
    }

    fn clamp_to_media(&self, seconds: f64) -> f64 {
        let duration = self.state.transport.duration;
        if duration > 0.0 {
            seconds.clamp(0.0, duration)
        } else {
            seconds.max(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_document, EngineCall, ScriptedEngine};

    struct Fixture {
        engine: Arc<ScriptedEngine>,
        player: PlayerController,
        cursor: ChapterCursor,
        feeds: mpsc::UnboundedReceiver<FeedEvent>,
    }

    fn fixture(chapters: usize) -> Fixture {
        let engine = Arc::new(ScriptedEngine::new());
        let (tx, feeds) = mpsc::unbounded_channel();
        let player = PlayerController::new(engine.clone(), PlayerOptions::default(), tx);
        let mut cursor = ChapterCursor::new();
        cursor.load(sample_document(chapters));
        let mut fixture = Fixture {
            engine,
            player,
            cursor,
            feeds,
        };
        fixture.act(PlayerAction::ChapterChanged);
        fixture
    }

    impl Fixture {
        fn act(&mut self, action: PlayerAction) -> Vec<PlayerOutput> {
            self.player.handle(action, &mut self.cursor)
        }

        fn tick(&mut self, tick: FeedTick) -> Vec<PlayerOutput> {
            let generation = self.player.media().generation();
            self.player
                .handle_feed(FeedEvent { generation, tick }, &mut self.cursor)
        }

        fn transport(&self) -> &Transport {
            &self.player.state().transport
        }
    }

    #[tokio::test]
    async fn test_inbound_chapter_change_binds_first_key_point() {
        let fx = fixture(3);
        let state = fx.player.state();
        assert_eq!(state.phase, PlayerPhase::Loading);
        assert_eq!(state.book.key_point_label, "KEY POINT 1 OF 3");
        assert_eq!(state.book.key_point_title, "Chapter 1");
        assert_eq!(
            state.book.cover_ref.as_deref(),
            Some("https://example.com/cover.png")
        );
        assert!(!state.can_skip_backward);
        assert!(state.can_skip_forward);
        assert_eq!(
            fx.engine.loaded().as_deref(),
            Some("https://example.com/audio/1.mp3")
        );
    }

    #[tokio::test]
    async fn test_skip_forward_stops_at_last_key_point() {
        let mut fx = fixture(3);
        assert_eq!(fx.act(PlayerAction::SkipForward), vec![PlayerOutput::ChapterChanged]);
        assert_eq!(fx.act(PlayerAction::SkipForward), vec![PlayerOutput::ChapterChanged]);
        assert_eq!(fx.cursor.current_number(), Some(3));
        assert!(fx.cursor.is_last());
        assert!(!fx.player.state().can_skip_forward);

        let calls = fx.engine.calls();
        let generation = fx.player.media().generation();
        assert!(fx.act(PlayerAction::SkipForward).is_empty());
        assert_eq!(fx.cursor.current_number(), Some(3));
        assert_eq!(fx.engine.calls(), calls);
        assert_eq!(fx.player.media().generation(), generation);
    }

    #[tokio::test]
    async fn test_skip_backward_rebinds_previous_key_point() {
        let mut fx = fixture(3);
        fx.act(PlayerAction::SkipForward);
        assert_eq!(fx.act(PlayerAction::SkipBackward), vec![PlayerOutput::ChapterChanged]);
        assert_eq!(fx.player.state().book.key_point_title, "Chapter 1");
        assert!(fx.act(PlayerAction::SkipBackward).is_empty());
    }

    #[tokio::test]
    async fn test_seek_forward_is_clamped_to_duration() {
        let mut fx = fixture(2);
        fx.tick(FeedTick::Duration(60.0));
        fx.tick(FeedTick::Position(55.0));
        fx.act(PlayerAction::SeekForward);
        assert_eq!(fx.transport().position, 60.0);
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Seek(60.0)));
        assert_eq!(fx.player.state().phase, PlayerPhase::Ready);
    }

    #[tokio::test]
    async fn test_seek_backward_is_clamped_to_zero() {
        let mut fx = fixture(2);
        fx.tick(FeedTick::Duration(60.0));
        fx.tick(FeedTick::Position(2.0));
        fx.act(PlayerAction::SeekBackward);
        assert_eq!(fx.transport().position, 0.0);
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Seek(0.0)));

        fx.tick(FeedTick::Position(20.0));
        fx.act(PlayerAction::SeekBackward);
        assert_eq!(fx.transport().position, 15.0);
    }

    #[tokio::test]
    async fn test_seek_forward_needs_known_duration() {
        let mut fx = fixture(2);
        fx.tick(FeedTick::Position(4.0));
        fx.act(PlayerAction::SeekForward);
        assert_eq!(fx.transport().position, 4.0);
    }

    #[tokio::test]
    async fn test_scrubbing_ignores_live_position() {
        let mut fx = fixture(2);
        fx.tick(FeedTick::Duration(120.0));
        fx.act(PlayerAction::ScrubStarted);
        fx.act(PlayerAction::ScrubMoved(30.0));
        for seconds in [5.0, 6.0, 7.0] {
            fx.tick(FeedTick::Position(seconds));
        }
        assert_eq!(fx.transport().position, 30.0);
        assert!(fx.player.state().is_scrubbing);

        fx.engine.clear_calls();
        fx.act(PlayerAction::ScrubFinished(42.0));
        assert_eq!(fx.transport().position, 42.0);
        assert_eq!(fx.engine.calls(), vec![EngineCall::Seek(42.0)]);
        assert!(!fx.player.state().is_scrubbing);

        fx.tick(FeedTick::Position(43.0));
        assert_eq!(fx.transport().position, 43.0);
    }

    #[tokio::test]
    async fn test_scrub_moves_do_not_seek() {
        let mut fx = fixture(2);
        fx.engine.clear_calls();
        fx.act(PlayerAction::ScrubStarted);
        fx.act(PlayerAction::ScrubMoved(10.0));
        fx.act(PlayerAction::ScrubMoved(11.0));
        assert!(fx.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ticks_from_previous_binding_are_dropped() {
        let mut fx = fixture(3);
        let stale = fx.player.media().generation();
        fx.act(PlayerAction::SkipForward);

        let outputs = fx.player.handle_feed(
            FeedEvent {
                generation: stale,
                tick: FeedTick::Completed,
            },
            &mut fx.cursor,
        );
        assert!(outputs.is_empty());
        fx.player.handle_feed(
            FeedEvent {
                generation: stale,
                tick: FeedTick::Position(33.0),
            },
            &mut fx.cursor,
        );
        assert_eq!(fx.cursor.current_number(), Some(2));
        assert_eq!(fx.transport().position, 0.0);
    }

    #[tokio::test]
    async fn test_completion_on_last_key_point_pauses() {
        let mut fx = fixture(2);
        fx.act(PlayerAction::SkipForward);
        fx.act(PlayerAction::PlayTapped);
        assert!(fx.transport().is_playing);

        assert!(fx.tick(FeedTick::Completed).is_empty());
        assert!(!fx.transport().is_playing);
        assert_eq!(fx.cursor.current_number(), Some(2));
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Pause));
    }

    #[tokio::test]
    async fn test_completion_advances_and_keeps_playing() {
        let mut fx = fixture(3);
        fx.act(PlayerAction::PlayTapped);
        fx.engine.clear_calls();

        assert_eq!(fx.tick(FeedTick::Completed), vec![PlayerOutput::ChapterChanged]);
        assert_eq!(fx.cursor.current_number(), Some(2));
        assert!(fx.transport().is_playing);
        assert_eq!(
            fx.engine.calls(),
            vec![
                EngineCall::Unload,
                EngineCall::Load("https://example.com/audio/2.mp3".to_string()),
                EngineCall::Play(1.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_paused_intent_survives_track_change() {
        let mut fx = fixture(3);
        fx.act(PlayerAction::SkipForward);
        assert!(!fx.transport().is_playing);
        assert!(!fx
            .engine
            .calls()
            .iter()
            .any(|call| matches!(call, EngineCall::Play(_))));
    }

    #[tokio::test]
    async fn test_engine_stall_shows_paused_and_keeps_intent() {
        let mut fx = fixture(3);
        fx.act(PlayerAction::PlayTapped);
        fx.tick(FeedTick::Playing(false));
        assert!(!fx.transport().is_playing);

        // The next key point still starts playing after a stall.
        fx.engine.clear_calls();
        fx.act(PlayerAction::SkipForward);
        assert!(fx.transport().is_playing);
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Play(1.0)));

        fx.tick(FeedTick::Playing(false));
        fx.act(PlayerAction::PlayTapped);
        assert!(fx.transport().is_playing);
    }

    #[tokio::test]
    async fn test_play_without_audio_stays_paused() {
        let mut fx = fixture(0);
        fx.act(PlayerAction::PlayTapped);
        assert!(!fx.transport().is_playing);
        assert!(fx.engine.calls().is_empty());

        let mut fx = fixture(2);
        fx.engine.reject_loads(true);
        let outputs = fx.act(PlayerAction::SkipForward);
        assert!(matches!(
            outputs.as_slice(),
            [PlayerOutput::ChapterChanged, PlayerOutput::ErrorReceived(_)]
        ));
        fx.act(PlayerAction::PlayTapped);
        assert!(!fx.transport().is_playing);
        assert_eq!(fx.player.state().phase, PlayerPhase::Idle);
    }

    #[tokio::test]
    async fn test_rate_cycles_and_applies_live() {
        let mut fx = fixture(1);
        fx.act(PlayerAction::PlayTapped);
        fx.act(PlayerAction::CycleRate);
        assert_eq!(fx.transport().rate, PlaybackRate::OneAndQuarter);
        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::SetRate(1.25)));

        for _ in 0..6 {
            fx.act(PlayerAction::CycleRate);
        }
        assert_eq!(fx.transport().rate, PlaybackRate::Normal);
    }

    #[tokio::test]
    async fn test_invalid_audio_reports_error_and_stays_idle() {
        let engine = Arc::new(ScriptedEngine::new());
        let (tx, _feeds) = mpsc::unbounded_channel();
        let mut player = PlayerController::new(engine.clone(), PlayerOptions::default(), tx);
        let mut document = sample_document(1);
        document.chapters[0].audio_ref = String::new();
        let mut cursor = ChapterCursor::new();
        cursor.load(document);

        let outputs = player.handle(PlayerAction::ChapterChanged, &mut cursor);
        assert!(matches!(
            outputs.as_slice(),
            [PlayerOutput::ErrorReceived(PortError::InvalidAudioSource(_))]
        ));
        assert_eq!(player.state().phase, PlayerPhase::Idle);
        assert_eq!(player.state().book.key_point_title, "Chapter 1");
    }

    #[tokio::test]
    async fn test_empty_document_leaves_player_idle() {
        let mut fx = fixture(0);
        assert_eq!(fx.player.state().phase, PlayerPhase::Idle);
        assert!(fx.act(PlayerAction::SkipForward).is_empty());
        fx.act(PlayerAction::SeekForward);
        assert_eq!(fx.transport().position, 0.0);
        assert!(fx.engine.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feeds_are_forwarded_with_generation() {
        let mut fx = fixture(2);
        let generation = fx.player.media().generation();
        fx.engine.announce_duration(90.0);
        assert_eq!(
            fx.feeds.recv().await,
            Some(FeedEvent {
                generation,
                tick: FeedTick::Duration(90.0)
            })
        );

        fx.engine.set_position(7.0);
        fx.act(PlayerAction::PlayTapped);
        assert_eq!(
            fx.feeds.recv().await,
            Some(FeedEvent {
                generation,
                tick: FeedTick::Position(7.0)
            })
        );
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(65.9), "01:05");
        assert_eq!(format_clock(3600.0), "60:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
    }
}
