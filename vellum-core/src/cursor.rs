//! Cursor state
//!
//! Position, style, the attributes applied to newly written cells, the
//! charset state and the active hyperlink all live here because DECSC/DECRC
//! save and restore them as one unit.

use serde::{Deserialize, Serialize};

use crate::cell::CellAttributes;
use crate::charset::CharsetState;

/// Cursor visual style (DECSCUSR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Row (0-indexed)
    pub row: usize,
    /// Column (0-indexed)
    pub col: usize,
    pub style: CursorStyle,
    pub visible: bool,
    pub blinking: bool,
    /// Attributes applied to newly written cells
    pub attrs: CellAttributes,
    /// DECOM: positions are relative to the margins
    pub origin_mode: bool,
    /// Cursor sits at the right margin; the next printable wraps first
    pub pending_wrap: bool,
    /// Active hyperlink id (0 = none)
    pub hyperlink_id: u32,
    /// Charset designations and shifts
    pub charset: CharsetState,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            row: 0,
            col: 0,
            style: CursorStyle::Block,
            visible: true,
            blinking: true,
            attrs: CellAttributes::default(),
            origin_mode: false,
            pending_wrap: false,
            hyperlink_id: 0,
            charset: CharsetState::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Saved state for DECSC/DECRC. Auto-wrap belongs to the mode register but
/// is captured here because DECRC restores it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedCursor {
    pub row: usize,
    pub col: usize,
    pub attrs: CellAttributes,
    pub origin_mode: bool,
    pub auto_wrap: bool,
    pub pending_wrap: bool,
    pub hyperlink_id: u32,
    pub charset: CharsetState,
    /// Whether a DECSC actually happened; DECRC on a fresh terminal homes
    pub valid: bool,
}

impl SavedCursor {
    pub fn capture(cursor: &Cursor, auto_wrap: bool) -> Self {
        Self {
            row: cursor.row,
            col: cursor.col,
            attrs: cursor.attrs,
            origin_mode: cursor.origin_mode,
            auto_wrap,
            pending_wrap: cursor.pending_wrap,
            hyperlink_id: cursor.hyperlink_id,
            charset: cursor.charset,
            valid: true,
        }
    }

    /// Restore into a cursor; returns the saved auto-wrap value
    pub fn restore(&self, cursor: &mut Cursor) -> bool {
        if !self.valid {
            cursor.row = 0;
            cursor.col = 0;
            cursor.pending_wrap = false;
            return true;
        }
        cursor.row = self.row;
        cursor.col = self.col;
        cursor.attrs = self.attrs;
        cursor.origin_mode = self.origin_mode;
        cursor.pending_wrap = self.pending_wrap;
        cursor.hyperlink_id = self.hyperlink_id;
        cursor.charset = self.charset;
        self.auto_wrap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Charset;

    #[test]
    fn test_cursor_new() {
        let cursor = Cursor::new();
        assert_eq!((cursor.row, cursor.col), (0, 0));
        assert!(cursor.visible);
        assert!(!cursor.pending_wrap);
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let mut cursor = Cursor::new();
        cursor.row = 5;
        cursor.col = 10;
        cursor.attrs.bold = true;
        cursor.hyperlink_id = 3;
        cursor.charset.g0 = Charset::DecSpecialGraphics;

        let saved = SavedCursor::capture(&cursor, false);

        cursor.reset();
        let auto_wrap = saved.restore(&mut cursor);

        assert_eq!((cursor.row, cursor.col), (5, 10));
        assert!(cursor.attrs.bold);
        assert_eq!(cursor.hyperlink_id, 3);
        assert_eq!(cursor.charset.g0, Charset::DecSpecialGraphics);
        assert!(!auto_wrap);
    }

    #[test]
    fn test_restore_without_save_homes() {
        let mut cursor = Cursor::new();
        cursor.row = 5;
        cursor.col = 7;
        let saved = SavedCursor::default();
        saved.restore(&mut cursor);
        assert_eq!((cursor.row, cursor.col), (0, 0));
    }
}
