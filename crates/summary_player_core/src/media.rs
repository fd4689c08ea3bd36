//! crates/summary_player_core/src/media.rs
//!
//! The media session drives playback of one audio clip through a `PlaybackEngine`
//! and exposes the engine's clock as observable feeds (position, duration, playing
//! state, completion).
//!
//! Every binding gets a fresh generation number and cancellation token. Rebinding
//! cancels the previous token, which ends every feed handed out for it, and the
//! generation lets consumers reject ticks that were already in flight.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::ports::{EngineSignal, PlaybackEngine, PortError, PortResult};
use crate::rate::PlaybackRate;

/// Default cadence of the position feed.
pub const DEFAULT_POSITION_INTERVAL: Duration = Duration::from_secs(1);

//=========================================================================================
// Feeds
//=========================================================================================

/// A live feed of values from one media binding.
///
/// The feed ends when the binding is torn down or when its own handle is cancelled.
pub struct Feed<T> {
    generation: u64,
    token: CancellationToken,
    stream: Pin<Box<dyn Stream<Item = T> + Send>>,
}

impl<T: Send + 'static> Feed<T> {
    fn finished(generation: u64) -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self {
            generation,
            token,
            stream: Box::pin(futures::stream::empty()),
        }
    }
}

impl<T> Feed<T> {
    /// The binding generation this feed belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A handle that ends this feed when cancelled, without touching the binding.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<T> Stream for Feed<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        this.stream.as_mut().poll_next(cx)
    }
}

fn is_valid_duration(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

//=========================================================================================
// Media Session
//=========================================================================================

struct Binding {
    source: Url,
    token: CancellationToken,
}

pub struct MediaSession {
    engine: Arc<dyn PlaybackEngine>,
    rate: PlaybackRate,
    cadence: Duration,
    generation: u64,
    binding: Option<Binding>,
}

impl MediaSession {
    pub fn new(engine: Arc<dyn PlaybackEngine>, cadence: Duration) -> Self {
        Self {
            engine,
            rate: PlaybackRate::default(),
            cadence,
            generation: 0,
            binding: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn source(&self) -> Option<&Url> {
        self.binding.as_ref().map(|binding| &binding.source)
    }

    /// Binds a new audio source, tearing down the previous one first.
    ///
    /// Returns the generation of the new binding. On failure the session is left
    /// unbound.
    pub fn setup(&mut self, source_ref: &str) -> PortResult<u64> {
        self.teardown();

        let trimmed = source_ref.trim();
        if trimmed.is_empty() {
            return Err(PortError::InvalidAudioSource(
                "the chapter has no audio".to_string(),
            ));
        }
        let source = Url::parse(trimmed)
            .map_err(|e| PortError::InvalidAudioSource(format!("'{}': {}", trimmed, e)))?;

        self.engine.load(&source)?;
        self.generation += 1;
        debug!(generation = self.generation, %source, "Media source bound.");
        self.binding = Some(Binding {
            source,
            token: CancellationToken::new(),
        });
        Ok(self.generation)
    }

    /// Releases the current binding and ends all of its feeds.
    pub fn teardown(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.token.cancel();
            self.engine.unload();
            // Anything emitted for the old binding is stale from here on.
            self.generation += 1;
            debug!(generation = self.generation, source = %binding.source, "Media source released.");
        }
    }

    pub fn play(&self) {
        if self.is_bound() {
            self.engine.play(self.rate.value());
        }
    }

    pub fn pause(&self) {
        if self.is_bound() {
            self.engine.pause();
        }
    }

    pub fn rate(&self) -> PlaybackRate {
        self.rate
    }

    /// Stores the rate and applies it immediately if audio is playing.
    pub fn set_rate(&mut self, rate: PlaybackRate) {
        self.rate = rate;
        if self.is_playing() {
            self.engine.set_rate(rate.value());
        }
    }

    /// Moves the play head. Callers are responsible for clamping.
    pub fn seek(&self, seconds: f64) {
        if self.is_bound() {
            self.engine.seek(seconds);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_bound() && self.engine.is_playing()
    }

    pub fn position(&self) -> f64 {
        if self.is_bound() {
            self.engine.position()
        } else {
            0.0
        }
    }

    /// Duration in seconds, `0.0` until known.
    pub fn duration(&self) -> f64 {
        if !self.is_bound() {
            return 0.0;
        }
        self.engine
            .duration()
            .filter(|d| is_valid_duration(*d))
            .unwrap_or(0.0)
    }

    /// The play head position, sampled at the configured cadence.
    pub fn position_feed(&self) -> Feed<f64> {
        let Some(binding) = &self.binding else {
            return Feed::finished(self.generation);
        };
        let token = binding.token.child_token();
        let guard = token.clone();
        let engine = Arc::clone(&self.engine);
        let cadence = self.cadence;

        let stream = async_stream::stream! {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                let sample = tokio::select! {
                    biased;
                    _ = guard.cancelled() => None,
                    _ = ticker.tick() => Some(engine.position()),
                };
                match sample {
                    Some(position) => yield position,
                    None => break,
                }
            }
        };

        Feed {
            generation: self.generation,
            token,
            stream: Box::pin(stream),
        }
    }

    /// The media duration: once when known and again whenever it changes.
    pub fn duration_feed(&self) -> Feed<f64> {
        // Subscribe before sampling so a change in between is not lost.
        let signals = self.engine.signals();
        let known = self.engine.duration().filter(|d| is_valid_duration(*d));
        self.signal_feed(signals, known, |signal| match signal {
            EngineSignal::DurationChanged(duration) if is_valid_duration(duration) => {
                Some(duration)
            }
            _ => None,
        })
    }

    /// The engine's own playing state, each time it changes without being told to.
    pub fn playing_feed(&self) -> Feed<bool> {
        self.signal_feed(self.engine.signals(), None, |signal| match signal {
            EngineSignal::PlayingChanged(playing) => Some(playing),
            _ => None,
        })
    }

    /// One item each time playback reaches the end of the media.
    pub fn completion_feed(&self) -> Feed<()> {
        self.signal_feed(self.engine.signals(), None, |signal| {
            matches!(signal, EngineSignal::ReachedEnd).then_some(())
        })
    }

    fn signal_feed<T: Send + 'static>(
        &self,
        mut signals: broadcast::Receiver<EngineSignal>,
        initial: Option<T>,
        pick: fn(EngineSignal) -> Option<T>,
    ) -> Feed<T> {
        let Some(binding) = &self.binding else {
            return Feed::finished(self.generation);
        };
        let token = binding.token.child_token();
        let guard = token.clone();

        let stream = async_stream::stream! {
            if let Some(value) = initial {
                yield value;
            }
            loop {
                let signal = tokio::select! {
                    biased;
                    _ = guard.cancelled() => None,
                    signal = signals.recv() => Some(signal),
                };
                match signal {
                    Some(Ok(signal)) => {
                        if let Some(value) = pick(signal) {
                            yield value;
                        }
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        trace!(skipped, "Feed lagged behind engine signals.");
                    }
                    Some(Err(RecvError::Closed)) | None => break,
                }
            }
        };

        Feed {
            generation: self.generation,
            token,
            stream: Box::pin(stream),
        }
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.token.cancel();
        }
    }
}
