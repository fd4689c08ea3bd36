//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the summary player application.

use serde::{Deserialize, Serialize};
use summary_player_core::{
    PlayerAction, PlayerPhase, PresentationMode, ReaderAction, ScrollDirection, SessionAction,
    SessionSnapshot,
};

use crate::adapters::{MediaCommand, MediaReport};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Fetches the summary. Sent once on connect, and again to retry after a failure.
    Start,
    ToggleMode,
    DismissError,

    // --- Player ---
    PlayTapped,
    SkipForward,
    SkipBackward,
    SeekForward,
    SeekBackward,
    CycleRate,
    ScrubStarted,
    ScrubMoved { seconds: f64 },
    ScrubFinished { seconds: f64 },

    // --- Reader ---
    PageForward,
    PageBackward,
    Scrolled { direction: Direction },

    // --- Reports from the client's audio element ---
    // Each echoes the `load_id` of the `load` command it is about.
    MediaTime { load_id: u64, seconds: f64 },
    MediaDuration { load_id: u64, seconds: f64 },
    MediaState { load_id: u64, playing: bool },
    MediaEnded { load_id: u64 },
}

/// Where a client message is routed.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Action(SessionAction),
    Report { load_id: u64, report: MediaReport },
}

impl From<ClientMessage> for Inbound {
    fn from(message: ClientMessage) -> Self {
        use ClientMessage as M;
        let player = |action| Inbound::Action(SessionAction::Player(action));
        let reader = |action| Inbound::Action(SessionAction::Reader(action));
        match message {
            M::Start => Inbound::Action(SessionAction::Start),
            M::ToggleMode => Inbound::Action(SessionAction::ToggleMode),
            M::DismissError => Inbound::Action(SessionAction::DismissError),
            M::PlayTapped => player(PlayerAction::PlayTapped),
            M::SkipForward => player(PlayerAction::SkipForward),
            M::SkipBackward => player(PlayerAction::SkipBackward),
            M::SeekForward => player(PlayerAction::SeekForward),
            M::SeekBackward => player(PlayerAction::SeekBackward),
            M::CycleRate => player(PlayerAction::CycleRate),
            M::ScrubStarted => player(PlayerAction::ScrubStarted),
            M::ScrubMoved { seconds } => player(PlayerAction::ScrubMoved(seconds)),
            M::ScrubFinished { seconds } => player(PlayerAction::ScrubFinished(seconds)),
            M::PageForward => reader(ReaderAction::PageForward),
            M::PageBackward => reader(ReaderAction::PageBackward),
            M::Scrolled { direction } => reader(ReaderAction::Scrolled(match direction {
                Direction::Up => ScrollDirection::Up,
                Direction::Down => ScrollDirection::Down,
            })),
            M::MediaTime { load_id, seconds } => Inbound::Report {
                load_id,
                report: MediaReport::Time(seconds),
            },
            M::MediaDuration { load_id, seconds } => Inbound::Report {
                load_id,
                report: MediaReport::Duration(seconds),
            },
            M::MediaState { load_id, playing } => Inbound::Report {
                load_id,
                report: MediaReport::State { playing },
            },
            M::MediaEnded { load_id } => Inbound::Report {
                load_id,
                report: MediaReport::Ended,
            },
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full session view, sent after every state change.
    State(SessionView),

    /// An instruction for the client's audio element.
    Media { command: MediaCommand },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SummaryView {
    pub title: String,
    pub author: String,
    pub cover: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub phase: &'static str,
    pub cover: Option<String>,
    pub key_point_title: String,
    pub key_point_label: String,
    pub can_skip_backward: bool,
    pub can_skip_forward: bool,
    pub is_playing: bool,
    pub rate: f32,
    pub rate_label: String,
    pub position: f64,
    pub duration: f64,
    pub position_label: String,
    pub duration_label: String,
    pub is_scrubbing: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReaderView {
    pub title: String,
    pub text: String,
    pub page_label: String,
    pub show_page_controls: bool,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionView {
    pub mode: &'static str,
    pub show_toggle: bool,
    pub is_fetching: bool,
    pub error: Option<String>,
    pub summary: Option<SummaryView>,
    pub player: PlayerView,
    pub reader: ReaderView,
}

impl From<&SessionSnapshot> for SessionView {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let player = &snapshot.player;
        let transport = &player.transport;
        Self {
            mode: match snapshot.mode {
                PresentationMode::Player => "player",
                PresentationMode::Reader => "reader",
            },
            show_toggle: snapshot.show_toggle,
            is_fetching: snapshot.is_fetching,
            error: snapshot.error.as_ref().map(ToString::to_string),
            summary: snapshot.summary.as_ref().map(|header| SummaryView {
                title: header.title.clone(),
                author: header.author.clone(),
                cover: header.cover_ref.clone(),
            }),
            player: PlayerView {
                phase: match player.phase {
                    PlayerPhase::Idle => "idle",
                    PlayerPhase::Loading => "loading",
                    PlayerPhase::Ready => "ready",
                },
                cover: player.book.cover_ref.clone(),
                key_point_title: player.book.key_point_title.clone(),
                key_point_label: player.book.key_point_label.clone(),
                can_skip_backward: player.can_skip_backward,
                can_skip_forward: player.can_skip_forward,
                is_playing: transport.is_playing,
                rate: transport.rate.value(),
                rate_label: transport.rate.label(),
                position: transport.position,
                duration: transport.duration,
                position_label: transport.position_label(),
                duration_label: transport.duration_label(),
                is_scrubbing: player.is_scrubbing,
            },
            reader: ReaderView {
                title: snapshot.reader.title.clone(),
                text: snapshot.reader.text.clone(),
                page_label: snapshot.reader.page_label.clone(),
                show_page_controls: snapshot.reader.show_page_controls,
                has_previous: snapshot.reader.has_previous,
                has_next: snapshot.reader.has_next,
            },
        }
    }
}
