//! crates/summary_player_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any network or serialization format.

/// The author of a summarized book.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Author {
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    /// The display name, skipping whichever half is empty.
    pub fn full_name(&self) -> String {
        [self.first_name.trim(), self.last_name.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single key point of a summary: a chapter of text with its narration clip.
///
/// Chapters have no identity of their own; they are addressed by their
/// position inside the owning [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub body_text: String,
    pub audio_ref: String,
}

/// A book summary as delivered by the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub author: Author,
    pub title: String,
    pub cover_ref: String,
    pub chapters: Vec<Chapter>,
}
