//! crates/summary_player_core/src/ports.rs
//!
//! Defines the service contracts (traits) the session core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific HTTP client or media playback primitive.

use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::domain::Document;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by every port operation.
///
/// Fetch, decode and media setup failures all end up in the coordinator's
/// error slot, so the type is cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("The summary address is not a valid URL")]
    InvalidUrl,
    #[error("The server returned an invalid response")]
    InvalidResponse,
    #[error("The server could not be reached: {0}")]
    Network(String),
    #[error("Request failed with client error {0}")]
    ClientError(u16),
    #[error("Request failed with server error {0}")]
    ServerError(u16),
    #[error("Request failed with unexpected status {0}")]
    UnknownStatus(u16),
    #[error("Failed to decode the summary: {0}")]
    DecodeFailure(String),
    #[error("Invalid audio source: {0}")]
    InvalidAudioSource(String),
    #[error("The player could not be initialized: {0}")]
    PlayerInitFailed(String),
}

impl PortError {
    /// Maps a non-success HTTP status code onto the error taxonomy.
    pub fn from_status(code: u16) -> Self {
        match code {
            400..=499 => PortError::ClientError(code),
            500..=599 => PortError::ServerError(code),
            _ => PortError::UnknownStatus(code),
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SummarySource: Send + Sync {
    /// Fetches and decodes the summary document. Called once per `start`.
    async fn fetch_summary(&self) -> PortResult<Document>;
}

/// Out-of-band notifications raised by a playback engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineSignal {
    /// The media duration became known or changed, in seconds.
    DurationChanged(f64),
    /// The engine started or stopped producing audio on its own, e.g. a stall
    /// or a pause issued outside the session.
    PlayingChanged(bool),
    /// Playback reached the end of the bound media.
    ReachedEnd,
}

/// A platform media primitive able to play one source at a time.
///
/// All methods other than `load` are inert when nothing is loaded.
pub trait PlaybackEngine: Send + Sync {
    /// Binds a new source, replacing whatever was loaded before.
    fn load(&self, source: &Url) -> PortResult<()>;
    /// Stops playback and releases the bound source.
    fn unload(&self);
    fn play(&self, rate: f32);
    fn pause(&self);
    /// Changes the live rate. Only meaningful while playing.
    fn set_rate(&self, rate: f32);
    fn seek(&self, seconds: f64);
    /// Whether the engine is actually producing audio, not whether it was asked to.
    fn is_playing(&self) -> bool;
    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn signals(&self) -> broadcast::Receiver<EngineSignal>;
}
