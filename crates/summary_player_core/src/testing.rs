//! crates/summary_player_core/src/testing.rs
//!
//! A scripted `PlaybackEngine` for tests. It records every call it receives and
//! lets the test decide when duration becomes known or playback ends.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use url::Url;

use crate::domain::{Author, Chapter, Document};
use crate::ports::{EngineSignal, PlaybackEngine, PortError, PortResult};

/// A summary with `chapters` key points titled `Chapter 1`, `Chapter 2`, ...
pub fn sample_document(chapters: usize) -> Document {
    Document {
        author: Author {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        },
        title: "Notes on the Analytical Engine".to_string(),
        cover_ref: "https://example.com/cover.png".to_string(),
        chapters: (1..=chapters)
            .map(|n| Chapter {
                title: format!("Chapter {}", n),
                body_text: format!("Text of chapter {}", n),
                audio_ref: format!("https://example.com/audio/{}.mp3", n),
            })
            .collect(),
    }
}

/// A call received by the [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Unload,
    Play(f32),
    Pause,
    SetRate(f32),
    Seek(f64),
}

#[derive(Debug, Default)]
struct EngineState {
    loaded: Option<Url>,
    playing: bool,
    position: f64,
    duration: Option<f64>,
    reject_loads: bool,
    calls: Vec<EngineCall>,
}

pub struct ScriptedEngine {
    state: Mutex<EngineState>,
    signals: broadcast::Sender<EngineSignal>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(EngineState::default()),
            signals,
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// The URL currently bound, if any.
    pub fn loaded(&self) -> Option<String> {
        self.state().loaded.as_ref().map(Url::to_string)
    }

    /// Makes every following `load` fail as if the platform refused the source.
    pub fn reject_loads(&self, reject: bool) {
        self.state().reject_loads = reject;
    }

    pub fn set_position(&self, seconds: f64) {
        self.state().position = seconds;
    }

    /// Simulates a stall: the engine stops producing audio without being paused.
    pub fn stall(&self) {
        self.state().playing = false;
        let _ = self.signals.send(EngineSignal::PlayingChanged(false));
    }

    /// Simulates the engine recovering from a stall on its own.
    pub fn recover(&self) {
        let playing = {
            let mut state = self.state();
            state.playing = state.loaded.is_some();
            state.playing
        };
        if playing {
            let _ = self.signals.send(EngineSignal::PlayingChanged(true));
        }
    }

    pub fn announce_duration(&self, seconds: f64) {
        self.state().duration = Some(seconds);
        let _ = self.signals.send(EngineSignal::DurationChanged(seconds));
    }

    pub fn finish(&self) {
        {
            let mut state = self.state();
            state.playing = false;
            if let Some(duration) = state.duration {
                state.position = duration;
            }
        }
        let _ = self.signals.send(EngineSignal::ReachedEnd);
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn load(&self, source: &Url) -> PortResult<()> {
        let mut state = self.state();
        state.calls.push(EngineCall::Load(source.to_string()));
        if state.reject_loads {
            return Err(PortError::PlayerInitFailed(format!("rejected {}", source)));
        }
        state.loaded = Some(source.clone());
        state.playing = false;
        state.position = 0.0;
        state.duration = None;
        Ok(())
    }

    fn unload(&self) {
        let mut state = self.state();
        state.calls.push(EngineCall::Unload);
        state.loaded = None;
        state.playing = false;
    }

    fn play(&self, rate: f32) {
        let mut state = self.state();
        state.calls.push(EngineCall::Play(rate));
        state.playing = state.loaded.is_some();
    }

    fn pause(&self) {
        let mut state = self.state();
        state.calls.push(EngineCall::Pause);
        state.playing = false;
    }

    fn set_rate(&self, rate: f32) {
        self.state().calls.push(EngineCall::SetRate(rate));
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state();
        state.calls.push(EngineCall::Seek(seconds));
        state.position = seconds;
    }

    fn is_playing(&self) -> bool {
        self.state().playing
    }

    fn position(&self) -> f64 {
        self.state().position
    }

    fn duration(&self) -> Option<f64> {
        self.state().duration
    }

    fn signals(&self) -> broadcast::Receiver<EngineSignal> {
        self.signals.subscribe()
    }
}
