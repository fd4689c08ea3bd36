//! crates/summary_player_core/src/reader.rs
//!
//! The reader controller: the current key point presented as a page of text.

use crate::cursor::ChapterCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderState {
    pub title: String,
    pub text: String,
    /// Short page counter, e.g. `2/7`.
    pub page_label: String,
    /// Page buttons are only shown for summaries with more than one key point.
    pub show_page_controls: bool,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderAction {
    PageForward,
    PageBackward,
    /// The current chapter was changed elsewhere; refresh without announcing.
    ChapterChanged,
    Scrolled(ScrollDirection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderOutput {
    ChapterChanged,
    ScrollDirectionChanged(ScrollDirection),
}

#[derive(Debug, Default)]
pub struct ReaderController {
    state: ReaderState,
}

impl ReaderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    pub fn handle(&mut self, action: ReaderAction, cursor: &mut ChapterCursor) -> Vec<ReaderOutput> {
        match action {
            ReaderAction::PageForward => self.turn_page(cursor.advance(), cursor),
            ReaderAction::PageBackward => self.turn_page(cursor.retreat(), cursor),
            ReaderAction::ChapterChanged => {
                self.refresh(cursor);
                Vec::new()
            }
            ReaderAction::Scrolled(direction) => vec![ReaderOutput::ScrollDirectionChanged(direction)],
        }
    }

    fn turn_page(&mut self, moved: bool, cursor: &ChapterCursor) -> Vec<ReaderOutput> {
        if !moved {
            return Vec::new();
        }
        self.refresh(cursor);
        vec![ReaderOutput::ChapterChanged]
    }

    fn refresh(&mut self, cursor: &ChapterCursor) {
        let (Some(chapter), Some(number)) = (cursor.current(), cursor.current_number()) else {
            self.state = ReaderState::default();
            return;
        };
        self.state = ReaderState {
            title: chapter.title.clone(),
            text: chapter.body_text.clone(),
            page_label: format!("{}/{}", number, cursor.count()),
            show_page_controls: cursor.count() > 1,
            has_previous: !cursor.is_first(),
            has_next: !cursor.is_last(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_document;

    fn loaded(chapters: usize) -> (ReaderController, ChapterCursor) {
        let mut cursor = ChapterCursor::new();
        cursor.load(sample_document(chapters));
        let mut reader = ReaderController::new();
        reader.handle(ReaderAction::ChapterChanged, &mut cursor);
        (reader, cursor)
    }

    #[test]
    fn test_refresh_projects_current_key_point() {
        let (reader, _cursor) = loaded(3);
        let state = reader.state();
        assert_eq!(state.title, "Chapter 1");
        assert_eq!(state.text, "Text of chapter 1");
        assert_eq!(state.page_label, "1/3");
        assert!(state.show_page_controls);
        assert!(!state.has_previous);
        assert!(state.has_next);
    }

    #[test]
    fn test_paging_announces_chapter_change() {
        let (mut reader, mut cursor) = loaded(2);
        assert_eq!(
            reader.handle(ReaderAction::PageForward, &mut cursor),
            vec![ReaderOutput::ChapterChanged]
        );
        assert_eq!(reader.state().title, "Chapter 2");
        assert!(reader.state().has_previous);
        assert!(!reader.state().has_next);

        assert!(reader.handle(ReaderAction::PageForward, &mut cursor).is_empty());
        assert_eq!(cursor.current_number(), Some(2));

        assert_eq!(
            reader.handle(ReaderAction::PageBackward, &mut cursor),
            vec![ReaderOutput::ChapterChanged]
        );
        assert_eq!(reader.state().page_label, "1/2");
    }

    #[test]
    fn test_inbound_change_does_not_move_cursor() {
        let (mut reader, mut cursor) = loaded(3);
        cursor.advance();
        cursor.advance();
        assert!(reader.handle(ReaderAction::ChapterChanged, &mut cursor).is_empty());
        assert_eq!(reader.state().title, "Chapter 3");
        assert_eq!(cursor.current_number(), Some(3));
    }

    #[test]
    fn test_single_key_point_hides_page_controls() {
        let (reader, _cursor) = loaded(1);
        assert!(!reader.state().show_page_controls);
    }

    #[test]
    fn test_scroll_is_relayed_unchanged() {
        let (mut reader, mut cursor) = loaded(2);
        assert_eq!(
            reader.handle(ReaderAction::Scrolled(ScrollDirection::Down), &mut cursor),
            vec![ReaderOutput::ScrollDirectionChanged(ScrollDirection::Down)]
        );
        assert_eq!(cursor.current_number(), Some(1));
    }

    #[test]
    fn test_empty_document_clears_page() {
        let (reader, _cursor) = loaded(0);
        assert_eq!(reader.state(), &ReaderState::default());
    }
}
