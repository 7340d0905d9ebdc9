//! Terminal line representation
//!
//! A line is one row of the grid. Most lines a shell produces are plain
//! single-width text with uniform attributes, so the storage is a tagged
//! union: a *trivial* line holds the text as one string, an *inflated* line
//! holds a full cell vector. Any mutation that is not a pure right-edge
//! append upgrades trivial to inflated.
//!
//! Invariant: the text of a trivial line is printable 7-bit ASCII, so one
//! byte is one column.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellAttributes};

/// Per-line flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFlags {
    /// This line continues the previous line's logical content
    pub wrapped: bool,
    /// This line may be joined with a continuation on reflow
    pub wrappable: bool,
    /// Line carries a user mark (prompt jump targets etc.)
    pub marked: bool,
}

impl Default for LineFlags {
    fn default() -> Self {
        Self {
            wrapped: false,
            wrappable: true,
            marked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum LineStorage {
    Trivial { text: String, used: usize },
    Inflated(Vec<Cell>),
}

/// A single line in the terminal grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    storage: LineStorage,
    cols: usize,
    /// Uniform attributes while trivial; also the fill for blank columns
    attrs: CellAttributes,
    /// Uniform hyperlink while trivial (0 = none)
    hyperlink_id: u32,
    pub flags: LineFlags,
}

impl Line {
    pub fn new(cols: usize) -> Self {
        Self::with_attrs(cols, CellAttributes::default())
    }

    pub fn with_attrs(cols: usize, attrs: CellAttributes) -> Self {
        Self {
            storage: LineStorage::Trivial {
                text: String::new(),
                used: 0,
            },
            cols,
            attrs,
            hyperlink_id: 0,
            flags: LineFlags::default(),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_trivial(&self) -> bool {
        matches!(self.storage, LineStorage::Trivial { .. })
    }

    /// Text, attributes and hyperlink of a trivial line, for the render
    /// path which may draw it without inspecting cells
    pub fn trivial_view(&self) -> Option<(&str, CellAttributes, u32)> {
        match &self.storage {
            LineStorage::Trivial { text, .. } => Some((text, self.attrs, self.hyperlink_id)),
            LineStorage::Inflated(_) => None,
        }
    }

    /// The inflated cell slice, if this line is inflated
    pub fn as_cells(&self) -> Option<&[Cell]> {
        match &self.storage {
            LineStorage::Inflated(cells) => Some(cells),
            LineStorage::Trivial { .. } => None,
        }
    }

    /// Cell at a column, synthesized for trivial lines
    pub fn cell(&self, col: usize) -> Cell {
        match &self.storage {
            LineStorage::Trivial { text, used } => {
                if col < *used && col < text.len() {
                    let mut cell =
                        Cell::with_char_and_attrs(text.as_bytes()[col] as char, self.attrs);
                    cell.hyperlink_id = self.hyperlink_id;
                    cell
                } else {
                    Cell::blank(self.attrs)
                }
            }
            LineStorage::Inflated(cells) => cells
                .get(col)
                .cloned()
                .unwrap_or_else(|| Cell::blank(self.attrs)),
        }
    }

    /// Mutable cell access; upgrades the line to inflated storage
    pub fn cell_mut(&mut self, col: usize) -> &mut Cell {
        let cells = self.ensure_inflated();
        &mut cells[col]
    }

    /// Fast append for the bulk-text path. Succeeds only when the line is
    /// trivial, `col` is exactly the used width, the text fits, and the
    /// attributes match (an empty line adopts them). The caller guarantees
    /// `text` is printable ASCII.
    pub fn try_append(
        &mut self,
        col: usize,
        text: &str,
        attrs: CellAttributes,
        hyperlink_id: u32,
    ) -> bool {
        let cols = self.cols;
        match &mut self.storage {
            LineStorage::Trivial {
                text: existing,
                used,
            } => {
                if col != *used || *used + text.len() > cols {
                    return false;
                }
                if *used == 0 {
                    self.attrs = attrs;
                    self.hyperlink_id = hyperlink_id;
                } else if self.attrs != attrs || self.hyperlink_id != hyperlink_id {
                    return false;
                }
                existing.push_str(text);
                *used += text.len();
                true
            }
            LineStorage::Inflated(_) => false,
        }
    }

    fn ensure_inflated(&mut self) -> &mut Vec<Cell> {
        if let LineStorage::Trivial { text, .. } = &self.storage {
            let mut cells = Vec::with_capacity(self.cols);
            for c in text.chars() {
                let mut cell = Cell::with_char_and_attrs(c, self.attrs);
                cell.hyperlink_id = self.hyperlink_id;
                cells.push(cell);
            }
            cells.resize_with(self.cols, || Cell::blank(self.attrs));
            cells.truncate(self.cols);
            self.storage = LineStorage::Inflated(cells);
        }
        match &mut self.storage {
            LineStorage::Inflated(cells) => cells,
            LineStorage::Trivial { .. } => unreachable!(),
        }
    }

    /// Number of columns in use (trailing blanks excluded)
    pub fn used_columns(&self) -> usize {
        match &self.storage {
            LineStorage::Trivial { used, .. } => *used,
            LineStorage::Inflated(cells) => {
                let mut used = cells.len();
                while used > 0 {
                    let cell = &cells[used - 1];
                    if cell.is_empty() && !cell.is_continuation() && cell.image.is_none() {
                        used -= 1;
                    } else {
                        break;
                    }
                }
                used
            }
        }
    }

    /// Blank the whole line, returning to the compact representation
    pub fn clear(&mut self, attrs: CellAttributes) {
        self.storage = LineStorage::Trivial {
            text: String::new(),
            used: 0,
        };
        self.attrs = attrs;
        self.hyperlink_id = 0;
        self.flags = LineFlags::default();
    }

    /// Clear from column to end of line
    pub fn clear_from(&mut self, col: usize, attrs: CellAttributes) {
        if col == 0 {
            self.clear(attrs);
            return;
        }
        let cells = self.ensure_inflated();
        for cell in cells.iter_mut().skip(col) {
            cell.clear(attrs);
        }
    }

    /// Clear from start of line through column (inclusive)
    pub fn clear_to(&mut self, col: usize, attrs: CellAttributes) {
        if col + 1 >= self.cols {
            self.clear(attrs);
            return;
        }
        let cells = self.ensure_inflated();
        for cell in cells.iter_mut().take(col + 1) {
            cell.clear(attrs);
        }
    }

    /// Erase n cells at column in place (no shifting)
    pub fn erase_cells(&mut self, col: usize, n: usize, attrs: CellAttributes) {
        let cols = self.cols;
        let cells = self.ensure_inflated();
        for i in col..col.saturating_add(n).min(cols) {
            cells[i].clear(attrs);
        }
    }

    /// Selective variant: protected cells are left alone
    pub fn erase_cells_selective(&mut self, col: usize, n: usize, attrs: CellAttributes) {
        let cols = self.cols;
        let cells = self.ensure_inflated();
        for i in col..col.saturating_add(n).min(cols) {
            if !cells[i].attrs.protected {
                cells[i].clear(attrs);
            }
        }
    }

    /// Insert n blank cells at column; cells shifted past `right` are lost
    pub fn insert_cells_bounded(
        &mut self,
        col: usize,
        n: usize,
        right: usize,
        attrs: CellAttributes,
    ) {
        let right = right.min(self.cols.saturating_sub(1));
        if col > right || self.cols == 0 {
            return;
        }
        let cells = self.ensure_inflated();
        let n = n.min(right - col + 1);
        for _ in 0..n {
            cells.remove(right);
            cells.insert(col, Cell::blank(attrs));
        }
    }

    pub fn insert_cells(&mut self, col: usize, n: usize, attrs: CellAttributes) {
        let right = self.cols.saturating_sub(1);
        self.insert_cells_bounded(col, n, right, attrs);
    }

    /// Delete n cells at column, shifting left; blanks fill in before `right`
    pub fn delete_cells_bounded(
        &mut self,
        col: usize,
        n: usize,
        right: usize,
        attrs: CellAttributes,
    ) {
        let right = right.min(self.cols.saturating_sub(1));
        if col > right || self.cols == 0 {
            return;
        }
        let cells = self.ensure_inflated();
        let n = n.min(right - col + 1);
        for _ in 0..n {
            cells.remove(col);
            cells.insert(right, Cell::blank(attrs));
        }
    }

    pub fn delete_cells(&mut self, col: usize, n: usize, attrs: CellAttributes) {
        let right = self.cols.saturating_sub(1);
        self.delete_cells_bounded(col, n, right, attrs);
    }

    /// Fill every column with the same character (alignment pattern, DECFRA)
    pub fn fill(&mut self, c: char, attrs: CellAttributes) {
        if c.is_ascii() && !c.is_ascii_control() {
            self.storage = LineStorage::Trivial {
                text: std::iter::repeat(c).take(self.cols).collect(),
                used: self.cols,
            };
            self.attrs = attrs;
            self.hyperlink_id = 0;
            self.flags = LineFlags::default();
        } else {
            let cols = self.cols;
            let cells = self.ensure_inflated();
            for cell in cells.iter_mut().take(cols) {
                *cell = Cell::with_char_and_attrs(c, attrs);
            }
            self.flags = LineFlags::default();
        }
    }

    /// Resize to a new column count, truncating or padding on the right
    pub fn resize(&mut self, cols: usize, attrs: CellAttributes) {
        match &mut self.storage {
            LineStorage::Trivial { text, used } => {
                if *used > cols {
                    text.truncate(cols);
                    *used = cols;
                }
            }
            LineStorage::Inflated(cells) => {
                if cols > cells.len() {
                    cells.resize_with(cols, || Cell::blank(attrs));
                } else {
                    cells.truncate(cols);
                }
            }
        }
        self.cols = cols;
    }

    /// Text content with trailing blanks trimmed
    pub fn text(&self) -> String {
        match &self.storage {
            LineStorage::Trivial { text, .. } => text.trim_end().to_string(),
            LineStorage::Inflated(cells) => {
                let mut result = String::new();
                for cell in cells {
                    if cell.is_continuation() {
                        continue;
                    }
                    if cell.content().is_empty() {
                        result.push(' ');
                    } else {
                        result.push_str(cell.content());
                    }
                }
                result.trim_end().to_string()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.used_columns() == 0
    }

    /// Materialize the full cell vector (reflow, rectangle copies)
    pub fn to_cells(&self) -> Vec<Cell> {
        match &self.storage {
            LineStorage::Inflated(cells) => cells.clone(),
            LineStorage::Trivial { .. } => (0..self.cols).map(|i| self.cell(i)).collect(),
        }
    }
}
