//! services/api/src/adapters/remote_engine.rs
//!
//! A `PlaybackEngine` whose audio element lives in the browser. Commands are queued
//! for the connection to forward to the client, and the client's reports about its
//! audio element are folded back in as engine state and signals.
//!
//! Every `load` is numbered and the client echoes that number on its reports, so
//! events still in flight for an earlier source are recognised and dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use summary_player_core::ports::{EngineSignal, PlaybackEngine, PortError, PortResult};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use url::Url;

/// An instruction for the client's audio element.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaCommand {
    Load { load_id: u64, url: String },
    Play { rate: f32 },
    Pause,
    SetRate { rate: f32 },
    Seek { seconds: f64 },
    Stop,
}

/// What the client observed on its audio element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaReport {
    Time(f64),
    Duration(f64),
    State { playing: bool },
    Ended,
}

struct Loaded {
    id: u64,
    source: Url,
}

#[derive(Default)]
struct MediaStatus {
    /// The last load id handed out. Never reset.
    issued: u64,
    loaded: Option<Loaded>,
    playing: bool,
    position: f64,
    duration: Option<f64>,
}

impl MediaStatus {
    fn reset(&mut self, loaded: Option<Loaded>) {
        *self = MediaStatus {
            issued: self.issued,
            loaded,
            ..MediaStatus::default()
        };
    }
}

pub struct RemoteEngine {
    commands: mpsc::UnboundedSender<MediaCommand>,
    status: Mutex<MediaStatus>,
    signals: broadcast::Sender<EngineSignal>,
}

impl RemoteEngine {
    /// Creates the engine and the queue of commands destined for the client.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MediaCommand>) {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (signals, _) = broadcast::channel(32);
        let engine = Self {
            commands,
            status: Mutex::new(MediaStatus::default()),
            signals,
        };
        (engine, commands_rx)
    }

    /// Folds a client report about the source loaded as `load_id` into the engine state.
    ///
    /// Reports for any other load, or while nothing is loaded, are dropped.
    pub fn report(&self, load_id: u64, report: MediaReport) {
        let mut status = self.status();
        let current = status.loaded.as_ref().map(|loaded| loaded.id);
        if current != Some(load_id) {
            debug!(load_id, ?current, ?report, "Dropping media report for a stale source.");
            return;
        }
        match report {
            MediaReport::Time(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                status.position = seconds;
            }
            MediaReport::Duration(seconds) if seconds.is_finite() && seconds > 0.0 => {
                status.duration = Some(seconds);
                drop(status);
                let _ = self.signals.send(EngineSignal::DurationChanged(seconds));
            }
            MediaReport::State { playing } => {
                if status.playing != playing {
                    status.playing = playing;
                    drop(status);
                    let _ = self.signals.send(EngineSignal::PlayingChanged(playing));
                }
            }
            MediaReport::Ended => {
                status.playing = false;
                drop(status);
                let _ = self.signals.send(EngineSignal::ReachedEnd);
            }
            other => warn!(report = ?other, "Ignoring out-of-range media report."),
        }
    }

    fn status(&self) -> MutexGuard<'_, MediaStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, command: MediaCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                debug!(command = ?e.0, "Media command dropped; the connection is gone.");
                false
            }
        }
    }

    /// Sends a command only while a source is bound.
    fn send_bound(&self, status: &MediaStatus, command: MediaCommand) -> bool {
        status.loaded.is_some() && self.send(command)
    }
}

impl PlaybackEngine for RemoteEngine {
    fn load(&self, source: &Url) -> PortResult<()> {
        let mut status = self.status();
        status.issued += 1;
        let load_id = status.issued;
        if !self.send(MediaCommand::Load {
            load_id,
            url: source.to_string(),
        }) {
            status.reset(None);
            return Err(PortError::PlayerInitFailed(
                "the client connection is closed".to_string(),
            ));
        }
        debug!(load_id, %source, "Media load sent to client.");
        status.reset(Some(Loaded {
            id: load_id,
            source: source.clone(),
        }));
        Ok(())
    }

    fn unload(&self) {
        let mut status = self.status();
        if let Some(loaded) = &status.loaded {
            debug!(load_id = loaded.id, source = %loaded.source, "Stopping client media.");
            self.send(MediaCommand::Stop);
        }
        status.reset(None);
    }

    fn play(&self, rate: f32) {
        let mut status = self.status();
        if self.send_bound(&status, MediaCommand::Play { rate }) {
            status.playing = true;
        }
    }

    fn pause(&self) {
        let mut status = self.status();
        if self.send_bound(&status, MediaCommand::Pause) {
            status.playing = false;
        }
    }

    fn set_rate(&self, rate: f32) {
        let status = self.status();
        self.send_bound(&status, MediaCommand::SetRate { rate });
    }

    fn seek(&self, seconds: f64) {
        let mut status = self.status();
        if self.send_bound(&status, MediaCommand::Seek { seconds }) {
            status.position = seconds;
        }
    }

    fn is_playing(&self) -> bool {
        self.status().playing
    }

    fn position(&self) -> f64 {
        self.status().position
    }

    fn duration(&self) -> Option<f64> {
        self.status().duration
    }

    fn signals(&self) -> broadcast::Receiver<EngineSignal> {
        self.signals.subscribe()
    }
}
