//! crates/summary_player_core/src/rate.rs
//!
//! The fixed set of playback speeds offered by the player.

/// A playback speed multiplier. Cycling wraps from the fastest back to the slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackRate {
    Half,
    ThreeQuarters,
    #[default]
    Normal,
    OneAndQuarter,
    OneAndHalf,
    OneAndThreeQuarters,
    Double,
}

impl PlaybackRate {
    pub const ALL: [PlaybackRate; 7] = [
        PlaybackRate::Half,
        PlaybackRate::ThreeQuarters,
        PlaybackRate::Normal,
        PlaybackRate::OneAndQuarter,
        PlaybackRate::OneAndHalf,
        PlaybackRate::OneAndThreeQuarters,
        PlaybackRate::Double,
    ];

    pub fn value(self) -> f32 {
        match self {
            PlaybackRate::Half => 0.5,
            PlaybackRate::ThreeQuarters => 0.75,
            PlaybackRate::Normal => 1.0,
            PlaybackRate::OneAndQuarter => 1.25,
            PlaybackRate::OneAndHalf => 1.5,
            PlaybackRate::OneAndThreeQuarters => 1.75,
            PlaybackRate::Double => 2.0,
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|rate| *rate == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Label shown on the rate button, e.g. `1x` or `1.25x`.
    pub fn label(self) -> String {
        let value = self.value();
        if value.fract() == 0.0 {
            format!("{:.0}x", value)
        } else {
            format!("{}x", value)
        }
    }
}
