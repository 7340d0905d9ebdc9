//! vellum-core - Platform-independent terminal screen model
//!
//! This crate provides the data structures and logic for terminal emulation:
//! - Cells, lines (with a compact representation for plain-text lines),
//!   the visible grid and the scrollback ring
//! - Cursor, character sets, colors and the runtime palette
//! - Mode register (ANSI + DEC private, with save/restore stacks)
//! - The Screen operator surface the sequence dispatcher drives
//! - Selection, hyperlinks, image storage
//! - The double-buffered render snapshot exchanged with a renderer
//!
//! The crate is deterministic: the same sequence of operations always
//! produces the same screen state, which the snapshot-based tests rely on.

pub mod cell;
pub mod charset;
pub mod color;
pub mod cursor;
pub mod grid;
pub mod hyperlink;
pub mod image;
pub mod line;
pub mod modes;
pub mod render;
pub mod screen;
pub mod scrollback;
pub mod selection;
pub mod snapshot;

pub use cell::{Cell, CellAttributes, ImageFragment, UnderlineStyle};
pub use charset::{Charset, CharsetState};
pub use color::{Color, ColorPalette};
pub use cursor::{Cursor, CursorStyle, SavedCursor};
pub use grid::Grid;
pub use hyperlink::{Hyperlink, HyperlinkStore};
pub use image::{ImageStore, RasterizedImage};
pub use line::{Line, LineFlags};
pub use modes::Modes;
pub use render::{RenderBuffer, RenderBufferState, RenderCell, RenderCursor, RenderFrame, RenderLine};
pub use screen::Screen;
pub use scrollback::Scrollback;
pub use selection::{Selection, SelectionMode, SelectionState};
pub use snapshot::Snapshot;

use serde::{Deserialize, Serialize};

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub cols: usize,
    pub rows: usize,
}

impl Dimensions {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    /// Clamp to the smallest page a terminal can have
    pub fn sanitized(self) -> Self {
        Self {
            cols: self.cols.max(1),
            rows: self.rows.max(1),
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_default() {
        let dims = Dimensions::default();
        assert_eq!(dims.cols, 80);
        assert_eq!(dims.rows, 24);
    }

    #[test]
    fn test_dimensions_sanitized() {
        let dims = Dimensions::new(0, 0).sanitized();
        assert_eq!(dims.cols, 1);
        assert_eq!(dims.rows, 1);
    }
}
