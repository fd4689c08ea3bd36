//! crates/summary_player_core/src/cursor.rs
//!
//! The chapter cursor: the loaded document plus a pointer to the current key point.
//! Both the player and the reader controllers navigate through the same cursor.

use crate::domain::{Chapter, Document};

/// An ordered list of chapters with a current position.
///
/// The position is `None` until a document with at least one chapter is loaded,
/// and otherwise always a valid index into the loaded chapters.
#[derive(Debug, Default)]
pub struct ChapterCursor {
    document: Option<Document>,
    current: Option<usize>,
}

impl ChapterCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the document and rewinds to its first chapter.
    pub fn load(&mut self, document: Document) {
        self.current = if document.chapters.is_empty() {
            None
        } else {
            Some(0)
        };
        self.document = Some(document);
    }

    /// Moves to the next chapter. Returns `false` (and does nothing) at the last one.
    pub fn advance(&mut self) -> bool {
        match self.current {
            Some(index) if index + 1 < self.count() => {
                self.current = Some(index + 1);
                true
            }
            _ => false,
        }
    }

    /// Moves to the previous chapter. Returns `false` (and does nothing) at the first one.
    pub fn retreat(&mut self) -> bool {
        match self.current {
            Some(index) if index > 0 => {
                self.current = Some(index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn current(&self) -> Option<&Chapter> {
        let index = self.current?;
        self.document.as_ref()?.chapters.get(index)
    }

    /// 1-based number of the current chapter, for display.
    pub fn current_number(&self) -> Option<usize> {
        self.current.map(|index| index + 1)
    }

    pub fn count(&self) -> usize {
        self.document.as_ref().map_or(0, |doc| doc.chapters.len())
    }

    pub fn is_first(&self) -> bool {
        self.current == Some(0)
    }

    pub fn is_last(&self) -> bool {
        match self.current {
            Some(index) => index + 1 == self.count(),
            None => false,
        }
    }

    pub fn cover_ref(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.cover_ref.as_str())
    }
}
