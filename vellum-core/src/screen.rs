//! Terminal screen - the operator surface
//!
//! The Screen ties grids, cursor, scrollback, margins, tabs, modes and
//! images together. The sequence dispatcher calls these operations; nothing
//! here parses bytes or writes replies.

use std::collections::HashSet;

use vellum_parser::sixel::SixelImage;

use crate::cell::{char_width, Cell, CellAttributes, ImageFragment};
use crate::charset::{parse_charset_designation, Charset};
use crate::cursor::{Cursor, SavedCursor};
use crate::grid::Grid;
use crate::image::{ImageStore, RasterizedImage};
use crate::line::Line;
use crate::modes::Modes;
use crate::scrollback::{Scrollback, DEFAULT_SCROLLBACK_SIZE};
use crate::snapshot::Snapshot;
use crate::Dimensions;

/// Default tab stop interval
const DEFAULT_TAB_WIDTH: usize = 8;
/// Cell size in pixels assumed until the embedder reports a real one
const DEFAULT_CELL_PIXEL_SIZE: (u32, u32) = (10, 20);

/// The complete terminal screen state
#[derive(Debug, Clone)]
pub struct Screen {
    primary_grid: Grid,
    alternate_grid: Grid,
    using_alternate: bool,
    /// History; primary screen only
    scrollback: Scrollback,
    cursor: Cursor,
    saved_cursor_primary: SavedCursor,
    saved_cursor_alternate: SavedCursor,
    modes: Modes,
    /// Vertical margins (top, bottom), 0-indexed inclusive
    vertical_margins: Option<(usize, usize)>,
    /// Horizontal margins (left, right); honored only under DECLRMM
    horizontal_margins: Option<(usize, usize)>,
    tab_stops: Vec<bool>,
    images: ImageStore,
    cell_pixel_size: (u32, u32),
}

impl Screen {
    pub fn new(dims: Dimensions) -> Self {
        Self::with_history(dims, DEFAULT_SCROLLBACK_SIZE)
    }

    pub fn with_history(dims: Dimensions, max_history: usize) -> Self {
        let dims = dims.sanitized();
        Self {
            primary_grid: Grid::new(dims),
            alternate_grid: Grid::new(dims),
            using_alternate: false,
            scrollback: Scrollback::new(max_history),
            cursor: Cursor::new(),
            saved_cursor_primary: SavedCursor::default(),
            saved_cursor_alternate: SavedCursor::default(),
            modes: Modes::new(),
            vertical_margins: None,
            horizontal_margins: None,
            tab_stops: default_tab_stops(dims.cols),
            images: ImageStore::new(),
            cell_pixel_size: DEFAULT_CELL_PIXEL_SIZE,
        }
    }

    // --- accessors ---

    pub fn grid(&self) -> &Grid {
        if self.using_alternate {
            &self.alternate_grid
        } else {
            &self.primary_grid
        }
    }

    fn grid_mut(&mut self) -> &mut Grid {
        if self.using_alternate {
            &mut self.alternate_grid
        } else {
            &mut self.primary_grid
        }
    }

    pub fn primary_grid(&self) -> &Grid {
        &self.primary_grid
    }

    pub fn dimensions(&self) -> Dimensions {
        self.grid().dimensions()
    }

    pub fn cols(&self) -> usize {
        self.grid().cols()
    }

    pub fn rows(&self) -> usize {
        self.grid().rows()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut Modes {
        &mut self.modes
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    pub fn is_alternate(&self) -> bool {
        self.using_alternate
    }

    pub fn line(&self, row: usize) -> &Line {
        self.grid().line(row)
    }

    /// Line by absolute row: negative rows address scrollback (-1 = newest)
    pub fn absolute_line(&self, row: isize) -> Option<&Line> {
        if row >= 0 {
            self.grid().get_line(row as usize)
        } else {
            self.scrollback.get_from_end((-row - 1) as usize)
        }
    }

    pub fn set_cell_pixel_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.cell_pixel_size = (width, height);
        }
    }

    pub fn cell_pixel_size(&self) -> (u32, u32) {
        self.cell_pixel_size
    }

    // --- margins ---

    /// Vertical margins (top, bottom), clipped to the page
    pub fn scroll_region(&self) -> (usize, usize) {
        let rows = self.rows();
        match self.vertical_margins {
            Some((top, bottom)) => (top.min(rows - 1), bottom.min(rows - 1)),
            None => (0, rows - 1),
        }
    }

    /// Horizontal margins (left, right); the full page unless DECLRMM is set
    pub fn lr_margins(&self) -> (usize, usize) {
        let cols = self.cols();
        if self.modes.left_right_margin {
            if let Some((left, right)) = self.horizontal_margins {
                return (left.min(cols - 1), right.min(cols - 1));
            }
        }
        (0, cols - 1)
    }

    fn region_is_full_page(&self) -> bool {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        top == 0 && bottom == self.rows() - 1 && left == 0 && right == self.cols() - 1
    }

    /// DECSTBM (1-indexed, inclusive). Homes the cursor.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let rows = self.rows();
        let top = top.saturating_sub(1).min(rows - 1);
        let bottom = bottom.saturating_sub(1).min(rows - 1);
        self.vertical_margins = if top < bottom { Some((top, bottom)) } else { None };
        self.move_cursor_to(1, 1);
    }

    /// DECSLRM (1-indexed, inclusive). Homes the cursor.
    pub fn set_lr_margins(&mut self, left: usize, right: usize) {
        if !self.modes.left_right_margin {
            return;
        }
        let cols = self.cols();
        let left = left.saturating_sub(1).min(cols - 1);
        let right = right.saturating_sub(1).min(cols - 1);
        self.horizontal_margins = if left < right { Some((left, right)) } else { None };
        self.move_cursor_to(1, 1);
    }

    pub fn reset_margins(&mut self) {
        self.vertical_margins = None;
        self.horizontal_margins = None;
    }

    // --- printing ---

    /// Bulk text entry for runs of printable ASCII. Takes the trivial-line
    /// shortcut when the charset is plain and insert mode is off; otherwise
    /// degrades to the per-character path.
    pub fn write_text(&mut self, text: &str) {
        let can_fast = !self.modes.insert_mode && self.cursor.charset.is_plain();
        let mut rest = text;
        while !rest.is_empty() {
            if self.cursor.pending_wrap {
                if self.modes.auto_wrap {
                    self.wrap_to_next_line();
                } else {
                    self.cursor.pending_wrap = false;
                }
            }
            let (_, right) = self.lr_margins();
            if can_fast && self.cursor.col <= right {
                let avail = right + 1 - self.cursor.col;
                let take = avail.min(rest.len());
                let chunk = &rest[..take];
                let row = self.cursor.row;
                let col = self.cursor.col;
                let attrs = self.cursor.attrs;
                let link = self.cursor.hyperlink_id;
                if self
                    .grid_mut()
                    .line_mut(row)
                    .try_append(col, chunk, attrs, link)
                {
                    rest = &rest[take..];
                    self.cursor.col += take;
                    if self.cursor.col > right {
                        self.cursor.col = right;
                        if self.modes.auto_wrap {
                            self.cursor.pending_wrap = true;
                        }
                    }
                    continue;
                }
            }
            if let Some(c) = rest.chars().next() {
                rest = &rest[c.len_utf8()..];
                self.print(c);
            }
        }
    }

    /// Print one character at the cursor
    pub fn print(&mut self, c: char) {
        let c = self.cursor.charset.translate(c);
        self.cursor.charset.clear_single_shift();
        let width = char_width(c);

        if width == 0 {
            self.attach_combining(c);
            return;
        }

        if self.cursor.pending_wrap {
            if self.modes.auto_wrap {
                self.wrap_to_next_line();
            } else {
                self.cursor.pending_wrap = false;
            }
        }

        let (_, right) = self.lr_margins();
        // A wide character that no longer fits before the margin wraps early
        if width == 2 && self.cursor.col + 1 > right {
            if self.modes.auto_wrap {
                self.wrap_to_next_line();
            } else {
                return;
            }
        }

        let (_, right) = self.lr_margins();
        let cols = self.cols();
        let row = self.cursor.row;
        let col = self.cursor.col.min(cols - 1);
        let attrs = self.cursor.attrs;
        let link = self.cursor.hyperlink_id;

        if self.modes.insert_mode {
            self.grid_mut()
                .line_mut(row)
                .insert_cells_bounded(col, width as usize, right, attrs);
        }

        {
            let line = self.grid_mut().line_mut(row);
            let cell = line.cell_mut(col);
            cell.set_char(c);
            cell.attrs = attrs;
            cell.hyperlink_id = link;
            if width == 2 && col + 1 < cols {
                let spacer = line.cell_mut(col + 1);
                spacer.set_continuation();
                spacer.attrs = attrs;
            }
        }

        let new_col = col + width as usize;
        if new_col > right {
            self.cursor.col = right;
            if self.modes.auto_wrap {
                self.cursor.pending_wrap = true;
            }
        } else {
            self.cursor.col = new_col;
        }
    }

    /// Attach a combining mark to the most recently printed cell
    fn attach_combining(&mut self, c: char) {
        let row = self.cursor.row;
        let mut col = self.cursor.col;
        if !self.cursor.pending_wrap && col > 0 {
            col -= 1;
        }
        let line = self.grid_mut().line_mut(row);
        if col > 0 && line.cell(col).is_continuation() {
            col -= 1;
        }
        line.cell_mut(col).push_combining(c);
    }

    /// Wrap to the start of the next line, scrolling at the bottom margin.
    /// The continuation line is flagged as wrapped.
    fn wrap_to_next_line(&mut self) {
        self.cursor.pending_wrap = false;
        let (_, bottom) = self.scroll_region();
        let (left, _) = self.lr_margins();
        let wrappable = self.grid().line(self.cursor.row).flags.wrappable;
        if self.cursor.row == bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows() {
            self.cursor.row += 1;
        }
        self.cursor.col = left;
        if wrappable {
            let row = self.cursor.row;
            self.grid_mut().line_mut(row).flags.wrapped = true;
        }
    }

    // --- C0 control behavior ---

    pub fn backspace(&mut self) {
        let (left, _) = self.lr_margins();
        let floor = if self.cursor.col >= left { left } else { 0 };
        if self.cursor.col > floor {
            self.cursor.col -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    pub fn carriage_return(&mut self) {
        let (left, _) = self.lr_margins();
        self.cursor.col = if self.cursor.col >= left { left } else { 0 };
        self.cursor.pending_wrap = false;
    }

    /// IND / LF without new-line mode
    pub fn index(&mut self) {
        let (_, bottom) = self.scroll_region();
        if self.cursor.row == bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows() {
            self.cursor.row += 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// LF/VT/FF; honors LNM
    pub fn linefeed(&mut self) {
        self.index();
        if self.modes.linefeed_mode {
            self.carriage_return();
        }
    }

    /// RI
    pub fn reverse_index(&mut self) {
        let (top, _) = self.scroll_region();
        if self.cursor.row == top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// NEL
    pub fn next_line(&mut self) {
        self.index();
        self.carriage_return();
    }

    /// DECBI: cursor left; at the left margin the columns pan right
    pub fn back_index(&mut self) {
        let (left, right) = self.lr_margins();
        let (top, bottom) = self.scroll_region();
        if self.cursor.col == left {
            let attrs = self.cursor.attrs;
            self.grid_mut()
                .insert_columns(top, bottom, left, 1, right, attrs);
        } else if self.cursor.col > 0 {
            self.cursor.col -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// DECFI: cursor right; at the right margin the columns pan left
    pub fn forward_index(&mut self) {
        let (left, right) = self.lr_margins();
        let (top, bottom) = self.scroll_region();
        if self.cursor.col == right {
            let attrs = self.cursor.attrs;
            self.grid_mut()
                .delete_columns(top, bottom, left, 1, right, attrs);
        } else if self.cursor.col + 1 < self.cols() {
            self.cursor.col += 1;
        }
        self.cursor.pending_wrap = false;
    }

    // --- scrolling ---

    /// Scroll the margin region up by n. Returns the number of lines that
    /// entered history: nonzero only when the region covers the full page
    /// on the primary screen.
    pub fn scroll_up(&mut self, n: usize) -> usize {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let attrs = self.cursor.attrs;
        if left != 0 || right != self.cols() - 1 {
            self.grid_mut()
                .scroll_up_in_columns(top, bottom, left, right, n, attrs);
            return 0;
        }
        let evicted = self.grid_mut().scroll_up(top, bottom, n, attrs);
        let count = evicted.len();
        if !self.using_alternate && top == 0 && bottom == self.rows() - 1 {
            self.scrollback.push_lines(evicted);
            count
        } else {
            0
        }
    }

    /// Scroll the margin region down by n
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let attrs = self.cursor.attrs;
        if left != 0 || right != self.cols() - 1 {
            self.grid_mut()
                .scroll_down_in_columns(top, bottom, left, right, n, attrs);
        } else {
            self.grid_mut().scroll_down(top, bottom, n, attrs);
        }
    }

    // --- cursor motion ---

    /// CUP/HVP (1-indexed); origin mode maps coordinates into the margins
    pub fn move_cursor_to(&mut self, row: usize, col: usize) {
        let rows = self.rows();
        let cols = self.cols();
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let row = row.saturating_sub(1);
        let col = col.saturating_sub(1);

        if self.cursor.origin_mode {
            self.cursor.row = (top + row).min(bottom);
            self.cursor.col = (left + col).min(right);
        } else {
            self.cursor.row = row.min(rows - 1);
            self.cursor.col = col.min(cols - 1);
        }
        self.cursor.pending_wrap = false;
    }

    /// CUU: stops at the top margin when starting at or below it
    pub fn move_cursor_up(&mut self, n: usize) {
        let (top, _) = self.scroll_region();
        let floor = if self.cursor.row >= top { top } else { 0 };
        self.cursor.row = self.cursor.row.saturating_sub(n).max(floor);
        self.cursor.pending_wrap = false;
    }

    /// CUD: stops at the bottom margin when starting at or above it
    pub fn move_cursor_down(&mut self, n: usize) {
        let (_, bottom) = self.scroll_region();
        let ceiling = if self.cursor.row <= bottom {
            bottom
        } else {
            self.rows() - 1
        };
        self.cursor.row = (self.cursor.row + n).min(ceiling);
        self.cursor.pending_wrap = false;
    }

    /// CUB
    pub fn move_cursor_left(&mut self, n: usize) {
        let (left, _) = self.lr_margins();
        let floor = if self.cursor.col >= left { left } else { 0 };
        self.cursor.col = self.cursor.col.saturating_sub(n).max(floor);
        self.cursor.pending_wrap = false;
    }

    /// CUF
    pub fn move_cursor_right(&mut self, n: usize) {
        let (_, right) = self.lr_margins();
        let ceiling = if self.cursor.col <= right {
            right
        } else {
            self.cols() - 1
        };
        self.cursor.col = (self.cursor.col + n).min(ceiling);
        self.cursor.pending_wrap = false;
    }

    /// CHA/HPA (1-indexed)
    pub fn set_cursor_col(&mut self, col: usize) {
        let cols = self.cols();
        let col = col.saturating_sub(1);
        if self.cursor.origin_mode {
            let (left, right) = self.lr_margins();
            self.cursor.col = (left + col).min(right);
        } else {
            self.cursor.col = col.min(cols - 1);
        }
        self.cursor.pending_wrap = false;
    }

    /// VPA (1-indexed)
    pub fn set_cursor_row(&mut self, row: usize) {
        let rows = self.rows();
        let row = row.saturating_sub(1);
        if self.cursor.origin_mode {
            let (top, bottom) = self.scroll_region();
            self.cursor.row = (top + row).min(bottom);
        } else {
            self.cursor.row = row.min(rows - 1);
        }
        self.cursor.pending_wrap = false;
    }

    // --- cursor save/restore ---

    pub fn save_cursor(&mut self) {
        let saved = SavedCursor::capture(&self.cursor, self.modes.auto_wrap);
        if self.using_alternate {
            self.saved_cursor_alternate = saved;
        } else {
            self.saved_cursor_primary = saved;
        }
    }

    pub fn restore_cursor(&mut self) {
        let saved = if self.using_alternate {
            self.saved_cursor_alternate.clone()
        } else {
            self.saved_cursor_primary.clone()
        };
        let auto_wrap = saved.restore(&mut self.cursor);
        self.modes.auto_wrap = auto_wrap;
        let cols = self.cols();
        let rows = self.rows();
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.cursor.row = self.cursor.row.min(rows - 1);
    }

    // --- erase ---

    /// ED
    pub fn erase_display(&mut self, mode: u16) {
        let attrs = self.cursor.attrs;
        let row = self.cursor.row;
        let col = self.cursor.col;
        match mode {
            0 => self.grid_mut().clear_below(row, col, attrs),
            1 => self.grid_mut().clear_above(row, col, attrs),
            2 => self.grid_mut().clear(attrs),
            3 => self.clear_history(),
            _ => {}
        }
        self.cursor.pending_wrap = false;
    }

    /// DECSED: like ED but protected cells survive
    pub fn erase_display_selective(&mut self, mode: u16) {
        let attrs = self.cursor.attrs;
        let cols = self.cols();
        let rows = self.rows();
        let row = self.cursor.row;
        let col = self.cursor.col;
        match mode {
            0 => {
                self.grid_mut()
                    .line_mut(row)
                    .erase_cells_selective(col, cols - col, attrs);
                for r in row + 1..rows {
                    self.grid_mut()
                        .line_mut(r)
                        .erase_cells_selective(0, cols, attrs);
                }
            }
            1 => {
                for r in 0..row {
                    self.grid_mut()
                        .line_mut(r)
                        .erase_cells_selective(0, cols, attrs);
                }
                self.grid_mut()
                    .line_mut(row)
                    .erase_cells_selective(0, col + 1, attrs);
            }
            2 => {
                for r in 0..rows {
                    self.grid_mut()
                        .line_mut(r)
                        .erase_cells_selective(0, cols, attrs);
                }
            }
            _ => {}
        }
        self.cursor.pending_wrap = false;
    }

    /// EL
    pub fn erase_line(&mut self, mode: u16) {
        let attrs = self.cursor.attrs;
        let row = self.cursor.row;
        let col = self.cursor.col;
        match mode {
            0 => self.grid_mut().line_mut(row).clear_from(col, attrs),
            1 => self.grid_mut().line_mut(row).clear_to(col, attrs),
            2 => self.grid_mut().line_mut(row).clear(attrs),
            _ => {}
        }
        self.cursor.pending_wrap = false;
    }

    /// DECSEL
    pub fn erase_line_selective(&mut self, mode: u16) {
        let attrs = self.cursor.attrs;
        let cols = self.cols();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let line = self.grid_mut().line_mut(row);
        match mode {
            0 => line.erase_cells_selective(col, cols - col, attrs),
            1 => line.erase_cells_selective(0, col + 1, attrs),
            2 => line.erase_cells_selective(0, cols, attrs),
            _ => {}
        }
        self.cursor.pending_wrap = false;
    }

    /// ECH. Protection does not apply; only selective erases honor it.
    pub fn erase_chars(&mut self, n: usize) {
        let attrs = self.cursor.attrs;
        let row = self.cursor.row;
        let col = self.cursor.col;
        self.grid_mut().line_mut(row).erase_cells(col, n, attrs);
        self.cursor.pending_wrap = false;
    }

    pub fn clear_history(&mut self) {
        self.scrollback.clear();
    }

    // --- insert/delete ---

    /// IL; no-op outside the scroll region
    pub fn insert_lines(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let row = self.cursor.row;
        if row < top || row > bottom {
            return;
        }
        let attrs = self.cursor.attrs;
        if left != 0 || right != self.cols() - 1 {
            self.grid_mut()
                .scroll_down_in_columns(row, bottom, left, right, n, attrs);
        } else {
            self.grid_mut().insert_lines(row, n, bottom, attrs);
        }
        self.carriage_return();
    }

    /// DL
    pub fn delete_lines(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let row = self.cursor.row;
        if row < top || row > bottom {
            return;
        }
        let attrs = self.cursor.attrs;
        if left != 0 || right != self.cols() - 1 {
            self.grid_mut()
                .scroll_up_in_columns(row, bottom, left, right, n, attrs);
        } else {
            self.grid_mut().delete_lines(row, n, bottom, attrs);
        }
        self.carriage_return();
    }

    /// ICH
    pub fn insert_chars(&mut self, n: usize) {
        let (_, right) = self.lr_margins();
        let row = self.cursor.row;
        let col = self.cursor.col;
        if col > right {
            return;
        }
        let attrs = self.cursor.attrs;
        self.grid_mut()
            .line_mut(row)
            .insert_cells_bounded(col, n, right, attrs);
    }

    /// DCH
    pub fn delete_chars(&mut self, n: usize) {
        let (_, right) = self.lr_margins();
        let row = self.cursor.row;
        let col = self.cursor.col;
        if col > right {
            return;
        }
        let attrs = self.cursor.attrs;
        self.grid_mut()
            .line_mut(row)
            .delete_cells_bounded(col, n, right, attrs);
    }

    /// DECIC; no-op when the cursor is outside the margins
    pub fn insert_columns(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let col = self.cursor.col;
        if col < left || col > right || self.cursor.row < top || self.cursor.row > bottom {
            return;
        }
        let attrs = self.cursor.attrs;
        self.grid_mut()
            .insert_columns(top, bottom, col, n, right, attrs);
    }

    /// DECDC
    pub fn delete_columns(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let col = self.cursor.col;
        if col < left || col > right || self.cursor.row < top || self.cursor.row > bottom {
            return;
        }
        let attrs = self.cursor.attrs;
        self.grid_mut()
            .delete_columns(top, bottom, col, n, right, attrs);
    }

    // --- rectangular operations ---

    /// Clamp a 1-indexed rectangle to the page; `None` when degenerate
    fn clamp_rect(
        &self,
        top: usize,
        left: usize,
        bottom: usize,
        right: usize,
    ) -> Option<(usize, usize, usize, usize)> {
        let rows = self.rows();
        let cols = self.cols();
        let top = top.saturating_sub(1).min(rows - 1);
        let left = left.saturating_sub(1).min(cols - 1);
        let bottom = bottom.saturating_sub(1).min(rows - 1);
        let right = right.saturating_sub(1).min(cols - 1);
        if top > bottom || left > right {
            None
        } else {
            Some((top, left, bottom, right))
        }
    }

    /// DECFRA. The dispatcher validates the fill character.
    pub fn fill_rect(&mut self, c: char, top: usize, left: usize, bottom: usize, right: usize) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let attrs = self.cursor.attrs;
        for row in top..=bottom {
            let line = self.grid_mut().line_mut(row);
            for col in left..=right {
                *line.cell_mut(col) = Cell::with_char_and_attrs(c, attrs);
            }
        }
    }

    /// DECERA
    pub fn erase_rect(&mut self, top: usize, left: usize, bottom: usize, right: usize) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let attrs = self.cursor.attrs;
        for row in top..=bottom {
            self.grid_mut()
                .line_mut(row)
                .erase_cells(left, right - left + 1, attrs);
        }
    }

    /// DECSERA
    pub fn erase_rect_selective(&mut self, top: usize, left: usize, bottom: usize, right: usize) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let attrs = self.cursor.attrs;
        for row in top..=bottom {
            self.grid_mut()
                .line_mut(row)
                .erase_cells_selective(left, right - left + 1, attrs);
        }
    }

    /// DECCARA: apply an attribute change across a rectangle
    pub fn change_rect_attrs(
        &mut self,
        top: usize,
        left: usize,
        bottom: usize,
        right: usize,
        apply: &dyn Fn(&mut CellAttributes),
    ) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        for row in top..=bottom {
            let line = self.grid_mut().line_mut(row);
            for col in left..=right {
                apply(&mut line.cell_mut(col).attrs);
            }
        }
    }

    /// DECCRA: copy a rectangle. The source is materialized first, so
    /// overlapping regions copy correctly in either direction.
    pub fn copy_rect(
        &mut self,
        top: usize,
        left: usize,
        bottom: usize,
        right: usize,
        dst_top: usize,
        dst_left: usize,
    ) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let dst_top = dst_top.saturating_sub(1);
        let dst_left = dst_left.saturating_sub(1);
        let rows = self.rows();
        let cols = self.cols();

        let mut staged: Vec<(usize, usize, Cell)> = Vec::new();
        for row in top..=bottom {
            for col in left..=right {
                let dst_row = dst_top + (row - top);
                let dst_col = dst_left + (col - left);
                if dst_row < rows && dst_col < cols {
                    staged.push((dst_row, dst_col, self.grid().line(row).cell(col)));
                }
            }
        }
        for (row, col, cell) in staged {
            *self.grid_mut().line_mut(row).cell_mut(col) = cell;
        }
    }

    // --- tab stops ---

    /// HTS
    pub fn set_tab_stop(&mut self) {
        let col = self.cursor.col;
        if col < self.tab_stops.len() {
            self.tab_stops[col] = true;
        }
    }

    /// TBC
    pub fn clear_tab_stop(&mut self, mode: u16) {
        match mode {
            0 => {
                let col = self.cursor.col;
                if col < self.tab_stops.len() {
                    self.tab_stops[col] = false;
                }
            }
            3 => self.tab_stops.iter_mut().for_each(|stop| *stop = false),
            _ => {}
        }
    }

    /// HT / CHT: advance n tab stops, bounded by the right margin
    pub fn tab_forward(&mut self, n: usize) {
        let (_, right) = self.lr_margins();
        let mut col = self.cursor.col;
        for _ in 0..n.max(1) {
            col += 1;
            while col < right && !self.tab_stops.get(col).copied().unwrap_or(false) {
                col += 1;
            }
            if col >= right {
                col = right;
                break;
            }
        }
        self.cursor.col = col;
        self.cursor.pending_wrap = false;
    }

    /// CBT: back n tab stops, bounded by the left margin
    pub fn tab_backward(&mut self, n: usize) {
        let (left, _) = self.lr_margins();
        let mut col = self.cursor.col;
        for _ in 0..n.max(1) {
            if col == 0 {
                break;
            }
            col -= 1;
            while col > left && !self.tab_stops.get(col).copied().unwrap_or(false) {
                col -= 1;
            }
            if col <= left {
                col = left;
                break;
            }
        }
        self.cursor.col = col;
        self.cursor.pending_wrap = false;
    }

    /// Columns with a tab stop set (DECTABSR)
    pub fn tab_stop_columns(&self) -> Vec<usize> {
        self.tab_stops
            .iter()
            .enumerate()
            .filter_map(|(i, &set)| if set { Some(i) } else { None })
            .collect()
    }

    // --- charsets ---

    pub fn shift_in(&mut self) {
        self.cursor.charset.shift_in();
    }

    pub fn shift_out(&mut self) {
        self.cursor.charset.shift_out();
    }

    pub fn designate_charset(&mut self, slot: u8, designation: char) {
        let charset = parse_charset_designation(designation);
        self.cursor.charset.set_slot(slot, charset);
    }

    pub fn designate_charset_raw(&mut self, slot: u8, charset: Charset) {
        self.cursor.charset.set_slot(slot, charset);
    }

    // --- alternate screen ---

    pub fn enter_alternate_screen(&mut self, clear: bool) {
        if !self.using_alternate {
            self.using_alternate = true;
            self.modes.alternate_screen = true;
        }
        if clear {
            self.alternate_grid.clear(CellAttributes::default());
            self.cursor.row = 0;
            self.cursor.col = 0;
            self.cursor.pending_wrap = false;
        }
    }

    pub fn exit_alternate_screen(&mut self) {
        if self.using_alternate {
            self.using_alternate = false;
            self.modes.alternate_screen = false;
        }
    }

    // --- alignment pattern ---

    /// DECALN: fill the page with E, reset margins, home the cursor
    pub fn alignment_pattern(&mut self) {
        self.reset_margins();
        let attrs = CellAttributes::default();
        for line in self.grid_mut().iter_mut() {
            line.fill('E', attrs);
        }
        self.cursor.row = 0;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    // --- images ---

    /// Place a decoded sixel image at the cursor. Rows beyond the bottom
    /// margin scroll the page when sixel scrolling is enabled, otherwise
    /// the image is clipped.
    pub fn place_image(&mut self, image: SixelImage) {
        let (cell_w, cell_h) = self.cell_pixel_size;
        let cols_span = ((image.width + cell_w - 1) / cell_w) as usize;
        let rows_span = ((image.height + cell_h - 1) / cell_h) as usize;
        if cols_span == 0 || rows_span == 0 {
            return;
        }
        let raster = RasterizedImage {
            width: image.width,
            height: image.height,
            rgba: image.rgba,
            cell_span: (cols_span, rows_span),
        };
        let Some(id) = self.images.insert(raster) else {
            return;
        };

        let (_, bottom) = self.scroll_region();
        let (left, right) = self.lr_margins();
        let cols = self.cols();
        let base_col = self.cursor.col;
        let scrolling = self.modes.sixel_scrolling;

        let mut row = self.cursor.row;
        for frag_row in 0..rows_span {
            if frag_row > 0 {
                if row == bottom {
                    if scrolling {
                        self.scroll_up(1);
                    } else {
                        break;
                    }
                } else if row + 1 < self.rows() {
                    row += 1;
                } else {
                    break;
                }
            }
            let line = self.grid_mut().line_mut(row);
            for frag_col in 0..cols_span {
                let col = base_col + frag_col;
                if col >= cols {
                    break;
                }
                let cell = line.cell_mut(col);
                cell.clear(CellAttributes::default());
                cell.image = Some(ImageFragment {
                    image_id: id,
                    col: frag_col as u16,
                    row: frag_row as u16,
                });
            }
        }

        self.cursor.row = row;
        if self.modes.sixel_cursor_next_to_graphic {
            self.cursor.col = (base_col + cols_span).min(right);
        } else {
            // Cursor moves to the line below the graphic
            if row == bottom && scrolling {
                self.scroll_up(1);
            } else if row + 1 < self.rows() {
                self.cursor.row = row + 1;
            }
            self.cursor.col = left;
        }
        self.cursor.pending_wrap = false;
    }

    /// Ids of all images still referenced by a cell
    pub fn live_images(&self) -> HashSet<u32> {
        let mut live = HashSet::new();
        let mut scan = |line: &Line| {
            if let Some(cells) = line.as_cells() {
                for cell in cells {
                    if let Some(fragment) = cell.image {
                        live.insert(fragment.image_id);
                    }
                }
            }
        };
        self.primary_grid.iter().for_each(&mut scan);
        self.alternate_grid.iter().for_each(&mut scan);
        self.scrollback.iter().for_each(&mut scan);
        live
    }

    /// Ids of all hyperlinks still referenced by a cell
    pub fn live_hyperlinks(&self) -> HashSet<u32> {
        let mut live = HashSet::new();
        let mut scan = |line: &Line| {
            if let Some((_, _, link)) = line.trivial_view() {
                if link != 0 {
                    live.insert(link);
                }
            } else if let Some(cells) = line.as_cells() {
                for cell in cells {
                    if cell.hyperlink_id != 0 {
                        live.insert(cell.hyperlink_id);
                    }
                }
            }
        };
        self.primary_grid.iter().for_each(&mut scan);
        self.alternate_grid.iter().for_each(&mut scan);
        self.scrollback.iter().for_each(&mut scan);
        live
    }

    // --- resize ---

    /// Resize the screen. Reflows the primary screen when mode 2028 is on
    /// and the column count changed; otherwise truncates/pads.
    pub fn resize(&mut self, dims: Dimensions) {
        let dims = dims.sanitized();
        if dims == self.dimensions() {
            return;
        }
        let attrs = CellAttributes::default();

        if self.modes.reflow && dims.cols != self.primary_grid.cols() {
            self.reflow_primary(dims);
        } else {
            self.primary_grid.resize(dims, attrs);
        }
        self.alternate_grid.resize(dims, attrs);

        self.tab_stops = default_tab_stops(dims.cols);
        self.vertical_margins = None;
        self.horizontal_margins = None;
        self.cursor.col = self.cursor.col.min(dims.cols - 1);
        self.cursor.row = self.cursor.row.min(dims.rows - 1);
        self.cursor.pending_wrap = false;
    }

    /// Rebuild the primary grid and scrollback at a new width, joining
    /// wrapped continuations and re-splitting logical lines.
    fn reflow_primary(&mut self, dims: Dimensions) {
        let cursor_was_alt = self.using_alternate;
        let cursor_row = self.cursor.row;
        let cursor_col = self.cursor.col;

        let mut all = self.scrollback.drain_ordered();
        let cursor_phys = all.len() + cursor_row;
        all.extend(self.primary_grid.take_lines());

        // Drop blank padding below the cursor so it does not become content
        while all.len() > cursor_phys + 1 {
            let drop = all
                .last()
                .map(|l| l.is_empty() && !l.flags.wrapped)
                .unwrap_or(false);
            if drop {
                all.pop();
            } else {
                break;
            }
        }

        // Join physical lines into logical lines
        let mut logicals: Vec<Vec<Cell>> = Vec::new();
        let mut cursor_logical = 0usize;
        let mut cursor_offset = cursor_col;
        for (idx, line) in all.into_iter().enumerate() {
            let continuation = line.flags.wrapped && !logicals.is_empty();
            if continuation {
                if idx == cursor_phys {
                    cursor_logical = logicals.len() - 1;
                    let prior: usize = logicals.last().map(|c| c.len()).unwrap_or(0);
                    cursor_offset = prior + cursor_col;
                }
                if let Some(last) = logicals.last_mut() {
                    last.extend(line.to_cells());
                }
            } else {
                if idx == cursor_phys {
                    cursor_logical = logicals.len();
                    cursor_offset = cursor_col;
                }
                logicals.push(line.to_cells());
            }
        }
        if logicals.is_empty() {
            logicals.push(Vec::new());
        }

        // Trim trailing blanks per logical line (keep the cursor cell)
        for (index, cells) in logicals.iter_mut().enumerate() {
            let keep = if index == cursor_logical {
                cursor_offset + 1
            } else {
                0
            };
            while cells.len() > keep {
                let blank = cells
                    .last()
                    .map(|c| c.is_empty() && !c.is_continuation() && c.image.is_none())
                    .unwrap_or(false);
                if blank {
                    cells.pop();
                } else {
                    break;
                }
            }
        }

        // Re-split at the new width
        let new_cols = dims.cols;
        let mut phys: Vec<Line> = Vec::new();
        let mut cursor_new_phys = 0usize;
        let mut cursor_new_col = 0usize;
        for (index, cells) in logicals.into_iter().enumerate() {
            let chunk_count = (cells.len().max(1) + new_cols - 1) / new_cols;
            let first_phys = phys.len();
            for chunk_index in 0..chunk_count {
                let start = chunk_index * new_cols;
                let end = (start + new_cols).min(cells.len());
                let mut line = Line::new(new_cols);
                for (offset, cell) in cells[start.min(cells.len())..end].iter().enumerate() {
                    *line.cell_mut(offset) = cell.clone();
                }
                line.flags.wrapped = chunk_index > 0;
                phys.push(line);
            }
            if index == cursor_logical {
                let chunk = (cursor_offset / new_cols).min(chunk_count - 1);
                cursor_new_phys = first_phys + chunk;
                cursor_new_col = (cursor_offset - chunk * new_cols).min(new_cols - 1);
            }
        }

        // Last page worth of lines becomes the grid, the rest history
        let history_len = phys.len().saturating_sub(dims.rows);
        let grid_lines = phys.split_off(history_len);
        self.scrollback.clear();
        self.scrollback.push_lines(phys);
        self.primary_grid = Grid::from_lines(dims, grid_lines);

        if !cursor_was_alt {
            self.cursor.row = cursor_new_phys
                .saturating_sub(history_len)
                .min(dims.rows - 1);
            self.cursor.col = cursor_new_col.min(dims.cols - 1);
            self.cursor.pending_wrap = false;
        }
    }

    // --- reset / snapshot ---

    /// RIS-grade reset; history is dropped, dimensions kept
    pub fn reset(&mut self) {
        let dims = self.dimensions();
        let max_history = self.scrollback.max_lines();
        *self = Self::with_history(dims, max_history);
    }

    /// DECSTR: soft reset; screen content and history survive
    pub fn soft_reset(&mut self) {
        self.modes.set_dec_mode(25, true);
        self.modes.origin_mode = false;
        self.cursor.origin_mode = false;
        self.modes.auto_wrap = true;
        self.modes.insert_mode = false;
        self.cursor.attrs = CellAttributes::default();
        self.cursor.charset.reset();
        self.reset_margins();
        self.saved_cursor_primary = SavedCursor::default();
        self.saved_cursor_alternate = SavedCursor::default();
        self.cursor.pending_wrap = false;
    }

    pub fn snapshot(&self, include_scrollback: bool) -> Snapshot {
        Snapshot::from_screen(self, include_scrollback)
    }

    pub fn region_covers_page(&self) -> bool {
        self.region_is_full_page()
    }
}

fn default_tab_stops(cols: usize) -> Vec<bool> {
    let mut stops = vec![false; cols];
    for i in (0..cols).step_by(DEFAULT_TAB_WIDTH) {
        stops[i] = true;
    }
    stops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn test_new() {
        let screen = Screen::new(Dimensions::new(80, 24));
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.rows(), 24);
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 0));
    }

    #[test]
    fn test_write_text_trivial() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.write_text("Hello");
        assert_eq!(screen.cursor().col, 5);
        assert!(screen.line(0).is_trivial());
        assert_eq!(screen.line(0).text(), "Hello");
    }

    #[test]
    fn test_print_inflates_on_attr_change() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.write_text("ab");
        screen.cursor_mut().attrs.bold = true;
        screen.write_text("cd");
        assert!(!screen.line(0).is_trivial());
        assert!(screen.line(0).cell(2).attrs.bold);
        assert!(!screen.line(0).cell(1).attrs.bold);
    }

    #[test]
    fn test_wrap() {
        let mut screen = Screen::new(Dimensions::new(3, 3));
        screen.write_text("ABCD");
        assert_eq!(screen.line(0).text(), "ABC");
        assert_eq!(screen.line(1).text(), "D");
        assert!(screen.line(1).flags.wrapped);
        assert!(!screen.line(0).flags.wrapped);
        assert_eq!((screen.cursor().row, screen.cursor().col), (1, 1));
    }

    #[test]
    fn test_no_wrap_when_autowrap_off() {
        let mut screen = Screen::new(Dimensions::new(3, 3));
        screen.modes_mut().auto_wrap = false;
        screen.write_text("ABCD");
        assert_eq!(screen.line(0).text(), "ABD");
        assert_eq!(screen.cursor().row, 0);
    }

    #[test]
    fn test_wide_char() {
        let mut screen = Screen::new(Dimensions::new(10, 3));
        screen.print('中');
        assert_eq!(screen.line(0).cell(0).display_char(), '中');
        assert_eq!(screen.line(0).cell(0).width(), 2);
        assert!(screen.line(0).cell(1).is_continuation());
        assert_eq!(screen.cursor().col, 2);
    }

    #[test]
    fn test_combining_mark() {
        let mut screen = Screen::new(Dimensions::new(10, 3));
        screen.print('e');
        screen.print('\u{0301}');
        assert_eq!(screen.line(0).cell(0).content(), "e\u{0301}");
        assert_eq!(screen.cursor().col, 1);
    }

    #[test]
    fn test_linefeed_scrolls_to_history() {
        let mut screen = Screen::new(Dimensions::new(2, 2));
        screen.write_text("1");
        screen.carriage_return();
        screen.linefeed();
        screen.write_text("2");
        screen.carriage_return();
        screen.linefeed();
        screen.write_text("3");
        assert_eq!(screen.scrollback().len(), 1);
        assert_eq!(screen.scrollback().get(0).map(|l| l.text()), Some("1".into()));
        assert_eq!(screen.line(0).text(), "2");
        assert_eq!(screen.line(1).text(), "3");
    }

    #[test]
    fn test_scroll_in_margin_produces_no_history() {
        let mut screen = Screen::new(Dimensions::new(1, 5));
        for row in 0..5 {
            screen.move_cursor_to(row + 1, 1);
            screen.print((b'A' + row as u8) as char);
        }
        screen.set_scroll_region(2, 4);
        screen.move_cursor_to(4, 1);
        let pushed = screen.scroll_up(1);
        assert_eq!(pushed, 0);
        assert!(screen.scrollback().is_empty());
        assert_eq!(screen.line(0).text(), "A");
        assert_eq!(screen.line(1).text(), "C");
        assert_eq!(screen.line(4).text(), "E");
    }

    #[test]
    fn test_full_page_scroll_counts_history() {
        let mut screen = Screen::new(Dimensions::new(2, 3));
        let pushed = screen.scroll_up(2);
        assert_eq!(pushed, 2);
        assert_eq!(screen.scrollback().len(), 2);
    }

    #[test]
    fn test_cursor_motion_clamps() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.move_cursor_to(100, 200);
        assert_eq!((screen.cursor().row, screen.cursor().col), (23, 79));
        screen.move_cursor_up(50);
        assert_eq!(screen.cursor().row, 0);
    }

    #[test]
    fn test_origin_mode() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.set_scroll_region(5, 20);
        screen.modes_mut().origin_mode = true;
        screen.cursor_mut().origin_mode = true;
        screen.move_cursor_to(1, 1);
        assert_eq!(screen.cursor().row, 4);
        screen.move_cursor_to(100, 1);
        assert_eq!(screen.cursor().row, 19);
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.move_cursor_to(10, 20);
        screen.cursor_mut().attrs.bold = true;
        screen.cursor_mut().charset.g0 = Charset::DecSpecialGraphics;
        screen.modes_mut().auto_wrap = false;
        screen.save_cursor();

        screen.move_cursor_to(1, 1);
        screen.cursor_mut().attrs.bold = false;
        screen.cursor_mut().charset.g0 = Charset::Ascii;
        screen.modes_mut().auto_wrap = true;
        screen.restore_cursor();

        assert_eq!((screen.cursor().row, screen.cursor().col), (9, 19));
        assert!(screen.cursor().attrs.bold);
        assert_eq!(screen.cursor().charset.g0, Charset::DecSpecialGraphics);
        assert!(!screen.modes().auto_wrap);
    }

    #[test]
    fn test_erase_display_below() {
        let mut screen = Screen::new(Dimensions::new(10, 3));
        for row in 0..3 {
            screen.move_cursor_to(row + 1, 1);
            screen.write_text("XXXXXXXXXX");
        }
        screen.move_cursor_to(2, 5);
        screen.erase_display(0);
        assert_eq!(screen.line(0).text(), "XXXXXXXXXX");
        assert_eq!(screen.line(1).text(), "XXXX");
        assert!(screen.line(2).is_empty());
    }

    #[test]
    fn test_erase_display_clears_history_only_in_mode3() {
        let mut screen = Screen::new(Dimensions::new(2, 2));
        screen.scroll_up(1);
        assert_eq!(screen.scrollback().len(), 1);
        screen.erase_display(2);
        assert_eq!(screen.scrollback().len(), 1);
        screen.erase_display(3);
        assert!(screen.scrollback().is_empty());
    }

    #[test]
    fn test_selective_erase_respects_protection() {
        let mut screen = Screen::new(Dimensions::new(10, 2));
        screen.write_text("abc");
        screen.cursor_mut().attrs.protected = true;
        screen.write_text("DEF");
        screen.cursor_mut().attrs.protected = false;
        screen.write_text("ghi");
        screen.move_cursor_to(1, 1);
        screen.erase_line_selective(2);
        assert_eq!(screen.line(0).text(), "   DEF");
        // Plain EL erases everything
        screen.erase_line(2);
        assert!(screen.line(0).is_empty());
    }

    #[test]
    fn test_insert_delete_lines_at_cursor() {
        let mut screen = Screen::new(Dimensions::new(10, 5));
        for row in 0..5 {
            screen.move_cursor_to(row + 1, 1);
            screen.print((b'A' + row as u8) as char);
        }
        screen.move_cursor_to(2, 1);
        screen.insert_lines(2);
        assert_eq!(screen.line(0).text(), "A");
        assert!(screen.line(1).is_empty());
        assert!(screen.line(2).is_empty());
        assert_eq!(screen.line(3).text(), "B");
        assert_eq!(screen.line(4).text(), "C");
    }

    #[test]
    fn test_tab_stops() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.tab_forward(1);
        assert_eq!(screen.cursor().col, 8);
        screen.tab_forward(2);
        assert_eq!(screen.cursor().col, 24);
        screen.tab_backward(1);
        assert_eq!(screen.cursor().col, 16);

        screen.move_cursor_to(1, 5);
        screen.set_tab_stop();
        screen.move_cursor_to(1, 1);
        screen.tab_forward(1);
        assert_eq!(screen.cursor().col, 4);

        screen.clear_tab_stop(3);
        screen.move_cursor_to(1, 1);
        screen.tab_forward(1);
        assert_eq!(screen.cursor().col, 79);
    }

    #[test]
    fn test_alternate_screen_roundtrip() {
        let mut screen = Screen::new(Dimensions::new(80, 24));
        screen.write_text("primary");
        screen.enter_alternate_screen(true);
        assert!(screen.is_alternate());
        assert!(screen.line(0).is_empty());
        screen.write_text("ALT");
        screen.exit_alternate_screen();
        assert_eq!(screen.line(0).text(), "primary");
    }

    #[test]
    fn test_alignment_pattern() {
        let mut screen = Screen::new(Dimensions::new(4, 2));
        screen.set_scroll_region(1, 2);
        screen.alignment_pattern();
        assert_eq!(screen.line(0).text(), "EEEE");
        assert_eq!(screen.line(1).text(), "EEEE");
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 0));
    }

    #[test]
    fn test_rect_fill_and_erase() {
        let mut screen = Screen::new(Dimensions::new(6, 4));
        screen.fill_rect('x', 2, 2, 3, 5);
        assert_eq!(screen.line(1).text(), " xxxx");
        assert_eq!(screen.line(2).text(), " xxxx");
        assert!(screen.line(0).is_empty());
        screen.erase_rect(2, 3, 3, 4);
        assert_eq!(screen.line(1).text(), " x  x");
    }

    #[test]
    fn test_rect_copy() {
        let mut screen = Screen::new(Dimensions::new(8, 4));
        screen.write_text("AB");
        screen.copy_rect(1, 1, 1, 2, 3, 5);
        assert_eq!(screen.line(2).cell(4).display_char(), 'A');
        assert_eq!(screen.line(2).cell(5).display_char(), 'B');
    }

    #[test]
    fn test_change_rect_attrs() {
        let mut screen = Screen::new(Dimensions::new(4, 2));
        screen.write_text("abcd");
        screen.change_rect_attrs(1, 1, 1, 2, &|attrs| attrs.bold = true);
        assert!(screen.line(0).cell(0).attrs.bold);
        assert!(screen.line(0).cell(1).attrs.bold);
        assert!(!screen.line(0).cell(2).attrs.bold);
    }

    #[test]
    fn test_lr_margins_bound_motion() {
        let mut screen = Screen::new(Dimensions::new(10, 4));
        screen.modes_mut().set_dec_mode(69, true);
        screen.set_lr_margins(3, 7);
        screen.move_cursor_to(1, 1);
        // cursor outside margins may move freely up to the margin
        screen.move_cursor_right(100);
        assert_eq!(screen.cursor().col, 6);
        screen.carriage_return();
        assert_eq!(screen.cursor().col, 2);
    }

    #[test]
    fn test_insert_columns() {
        let mut screen = Screen::new(Dimensions::new(5, 2));
        screen.write_text("ABCDE");
        screen.move_cursor_to(1, 2);
        screen.insert_columns(1);
        assert_eq!(screen.line(0).text(), "A BCD");
    }

    #[test]
    fn test_resize_truncate_without_reflow() {
        let mut screen = Screen::new(Dimensions::new(10, 4));
        screen.modes_mut().reflow = false;
        screen.write_text("abcdefghij");
        screen.resize(Dimensions::new(5, 4));
        assert_eq!(screen.line(0).text(), "abcde");
    }

    #[test]
    fn test_resize_reflow_rewraps() {
        let mut screen = Screen::new(Dimensions::new(6, 4));
        screen.write_text("abcdefgh");
        assert_eq!(screen.line(0).text(), "abcdef");
        assert_eq!(screen.line(1).text(), "gh");
        screen.resize(Dimensions::new(4, 4));
        assert_eq!(screen.line(0).text(), "abcd");
        assert_eq!(screen.line(1).text(), "efgh");
        assert!(screen.line(1).flags.wrapped);
    }

    #[test]
    fn test_reflow_roundtrip() {
        let mut screen = Screen::new(Dimensions::new(6, 4));
        screen.write_text("abcdefgh");
        let before: Vec<String> = (0..4).map(|r| screen.line(r).text()).collect();
        screen.resize(Dimensions::new(3, 4));
        screen.resize(Dimensions::new(6, 4));
        let after: Vec<String> = (0..4).map(|r| screen.line(r).text()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reflow_joins_into_history() {
        let mut screen = Screen::new(Dimensions::new(4, 2));
        screen.write_text("abcdefgh");
        // 8 chars on a 4x2 page: two full lines, no history yet
        assert_eq!(screen.scrollback().len(), 0);
        screen.resize(Dimensions::new(2, 2));
        // Now 4 physical lines; two scroll into history
        assert_eq!(screen.scrollback().len(), 2);
        assert_eq!(screen.line(0).text(), "ef");
        assert_eq!(screen.line(1).text(), "gh");
    }

    #[test]
    fn test_place_image_fragments() {
        let mut screen = Screen::new(Dimensions::new(10, 5));
        screen.set_cell_pixel_size(10, 20);
        let image = SixelImage {
            width: 25,
            height: 30,
            rgba: vec![0; 25 * 30 * 4],
        };
        screen.place_image(image);
        // 25x30 px at 10x20 cells -> 3 cols x 2 rows
        let fragment = screen.line(0).cell(0).image.expect("fragment");
        assert_eq!((fragment.col, fragment.row), (0, 0));
        assert!(screen.line(0).cell(2).image.is_some());
        assert!(screen.line(0).cell(3).image.is_none());
        assert!(screen.line(1).cell(0).image.is_some());
        // Cursor dropped below the graphic
        assert_eq!(screen.cursor().row, 2);
        assert_eq!(screen.images().len(), 1);
    }

    #[test]
    fn test_soft_reset_keeps_content() {
        let mut screen = Screen::new(Dimensions::new(10, 3));
        screen.write_text("keep");
        screen.cursor_mut().attrs.fg = Color::Indexed(1);
        screen.set_scroll_region(1, 2);
        screen.soft_reset();
        assert_eq!(screen.line(0).text(), "keep");
        assert_eq!(screen.cursor().attrs, CellAttributes::default());
        assert_eq!(screen.scroll_region(), (0, 2));
    }
}
