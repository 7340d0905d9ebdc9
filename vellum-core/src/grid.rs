//! Terminal grid - the visible page
//!
//! A 2D cell store addressed as rows of [`Line`]s. Scroll, insert and
//! delete come in two flavors: whole-line operations for the common case
//! and column-bounded variants for when horizontal margins are active.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellAttributes};
use crate::line::Line;
use crate::Dimensions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    lines: Vec<Line>,
    cols: usize,
    rows: usize,
}

impl Grid {
    pub fn new(dims: Dimensions) -> Self {
        let lines = (0..dims.rows).map(|_| Line::new(dims.cols)).collect();
        Self {
            lines,
            cols: dims.cols,
            rows: dims.rows,
        }
    }

    /// Build a grid from prepared lines: the last `dims.rows` entries fill
    /// the page bottom-up, the rest is the caller's problem (history).
    pub fn from_lines(dims: Dimensions, mut lines: Vec<Line>) -> Self {
        for line in &mut lines {
            line.resize(dims.cols, CellAttributes::default());
        }
        while lines.len() < dims.rows {
            lines.push(Line::new(dims.cols));
        }
        let overflow = lines.len() - dims.rows;
        let lines = lines.split_off(overflow);
        Self {
            lines,
            cols: dims.cols,
            rows: dims.rows,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            cols: self.cols,
            rows: self.rows,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn line(&self, row: usize) -> &Line {
        &self.lines[row]
    }

    pub fn line_mut(&mut self, row: usize) -> &mut Line {
        &mut self.lines[row]
    }

    pub fn get_line(&self, row: usize) -> Option<&Line> {
        self.lines.get(row)
    }

    pub fn get_line_mut(&mut self, row: usize) -> Option<&mut Line> {
        self.lines.get_mut(row)
    }

    pub fn clear(&mut self, attrs: CellAttributes) {
        for line in &mut self.lines {
            line.clear(attrs);
        }
    }

    /// Clear from (row, col) to the end of the page
    pub fn clear_below(&mut self, row: usize, col: usize, attrs: CellAttributes) {
        if row >= self.rows {
            return;
        }
        self.lines[row].clear_from(col, attrs);
        for line in self.lines.iter_mut().skip(row + 1) {
            line.clear(attrs);
        }
    }

    /// Clear from the start of the page through (row, col)
    pub fn clear_above(&mut self, row: usize, col: usize, attrs: CellAttributes) {
        if row >= self.rows {
            return;
        }
        for line in self.lines.iter_mut().take(row) {
            line.clear(attrs);
        }
        self.lines[row].clear_to(col, attrs);
    }

    /// Scroll rows `top..=bottom` up by n; evicted lines are returned so the
    /// caller can decide whether they become history.
    pub fn scroll_up(
        &mut self,
        top: usize,
        bottom: usize,
        n: usize,
        attrs: CellAttributes,
    ) -> Vec<Line> {
        if top >= self.rows || bottom >= self.rows || top > bottom {
            return Vec::new();
        }
        let n = n.min(bottom - top + 1);
        let mut evicted = Vec::with_capacity(n);
        for _ in 0..n {
            let line = self.lines.remove(top);
            evicted.push(line);
            self.lines
                .insert(bottom, Line::with_attrs(self.cols, attrs));
        }
        evicted
    }

    /// Scroll rows `top..=bottom` down by n
    pub fn scroll_down(&mut self, top: usize, bottom: usize, n: usize, attrs: CellAttributes) {
        if top >= self.rows || bottom >= self.rows || top > bottom {
            return;
        }
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            self.lines.remove(bottom);
            self.lines.insert(top, Line::with_attrs(self.cols, attrs));
        }
    }

    /// Scroll up confined to columns `left..=right` (horizontal margins)
    pub fn scroll_up_in_columns(
        &mut self,
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
        n: usize,
        attrs: CellAttributes,
    ) {
        if top >= self.rows || bottom >= self.rows || top > bottom || left > right {
            return;
        }
        let right = right.min(self.cols.saturating_sub(1));
        let n = n.min(bottom - top + 1);
        for row in top..=bottom {
            let src_row = row + n;
            if src_row <= bottom {
                let moved: Vec<Cell> =
                    (left..=right).map(|c| self.lines[src_row].cell(c)).collect();
                for (col, cell) in (left..=right).zip(moved) {
                    *self.lines[row].cell_mut(col) = cell;
                }
            } else {
                self.lines[row].erase_cells(left, right - left + 1, attrs);
            }
        }
    }

    /// Scroll down confined to columns `left..=right`
    pub fn scroll_down_in_columns(
        &mut self,
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
        n: usize,
        attrs: CellAttributes,
    ) {
        if top >= self.rows || bottom >= self.rows || top > bottom || left > right {
            return;
        }
        let right = right.min(self.cols.saturating_sub(1));
        let n = n.min(bottom - top + 1);
        for row in (top..=bottom).rev() {
            if row >= top + n {
                let src_row = row - n;
                let moved: Vec<Cell> =
                    (left..=right).map(|c| self.lines[src_row].cell(c)).collect();
                for (col, cell) in (left..=right).zip(moved) {
                    *self.lines[row].cell_mut(col) = cell;
                }
            } else {
                self.lines[row].erase_cells(left, right - left + 1, attrs);
            }
        }
    }

    /// IL: insert blank lines at `row`, pushing lines toward `bottom`
    pub fn insert_lines(&mut self, row: usize, n: usize, bottom: usize, attrs: CellAttributes) {
        if row >= self.rows || row > bottom || bottom >= self.rows {
            return;
        }
        let n = n.min(bottom - row + 1);
        for _ in 0..n {
            self.lines.remove(bottom);
            self.lines.insert(row, Line::with_attrs(self.cols, attrs));
        }
    }

    /// DL: delete lines at `row`, pulling blanks in at `bottom`
    pub fn delete_lines(&mut self, row: usize, n: usize, bottom: usize, attrs: CellAttributes) {
        if row >= self.rows || row > bottom || bottom >= self.rows {
            return;
        }
        let n = n.min(bottom - row + 1);
        for _ in 0..n {
            self.lines.remove(row);
            self.lines
                .insert(bottom, Line::with_attrs(self.cols, attrs));
        }
    }

    /// DECIC: insert blank columns at `col` in rows `top..=bottom`
    pub fn insert_columns(
        &mut self,
        top: usize,
        bottom: usize,
        col: usize,
        n: usize,
        right: usize,
        attrs: CellAttributes,
    ) {
        if top >= self.rows || bottom >= self.rows {
            return;
        }
        for row in top..=bottom.min(self.rows - 1) {
            self.lines[row].insert_cells_bounded(col, n, right, attrs);
        }
    }

    /// DECDC: delete columns at `col` in rows `top..=bottom`
    pub fn delete_columns(
        &mut self,
        top: usize,
        bottom: usize,
        col: usize,
        n: usize,
        right: usize,
        attrs: CellAttributes,
    ) {
        if top >= self.rows || bottom >= self.rows {
            return;
        }
        for row in top..=bottom.min(self.rows - 1) {
            self.lines[row].delete_cells_bounded(col, n, right, attrs);
        }
    }

    /// Resize without reflow: truncate or pad on the right/bottom
    pub fn resize(&mut self, dims: Dimensions, attrs: CellAttributes) {
        for line in &mut self.lines {
            line.resize(dims.cols, attrs);
        }
        if dims.rows > self.rows {
            for _ in self.rows..dims.rows {
                self.lines.push(Line::with_attrs(dims.cols, attrs));
            }
        } else {
            self.lines.truncate(dims.rows);
        }
        self.cols = dims.cols;
        self.rows = dims.rows;
    }

    /// Move all lines out (reflow rebuilds the grid afterwards)
    pub fn take_lines(&mut self) -> Vec<Line> {
        let lines = std::mem::take(&mut self.lines);
        self.lines = (0..self.rows).map(|_| Line::new(self.cols)).collect();
        lines
    }

    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        self.lines.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_grid(cols: usize, rows: usize) -> Grid {
        let mut grid = Grid::new(Dimensions::new(cols, rows));
        for row in 0..rows {
            grid.line_mut(row)
                .cell_mut(0)
                .set_char((b'A' + row as u8) as char);
        }
        grid
    }

    #[test]
    fn test_grid_new() {
        let grid = Grid::new(Dimensions::new(80, 24));
        assert_eq!(grid.cols(), 80);
        assert_eq!(grid.rows(), 24);
    }

    #[test]
    fn test_scroll_up_returns_evicted() {
        let mut grid = letter_grid(10, 5);
        let evicted = grid.scroll_up(0, 4, 2, CellAttributes::default());
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].cell(0).display_char(), 'A');
        assert_eq!(evicted[1].cell(0).display_char(), 'B');
        assert_eq!(grid.line(0).cell(0).display_char(), 'C');
        assert!(grid.line(3).cell(0).is_empty());
    }

    #[test]
    fn test_scroll_down() {
        let mut grid = letter_grid(10, 5);
        grid.scroll_down(0, 4, 2, CellAttributes::default());
        assert!(grid.line(0).cell(0).is_empty());
        assert!(grid.line(1).cell(0).is_empty());
        assert_eq!(grid.line(2).cell(0).display_char(), 'A');
        assert_eq!(grid.line(4).cell(0).display_char(), 'C');
    }

    #[test]
    fn test_scroll_region_only() {
        let mut grid = letter_grid(10, 5);
        grid.scroll_up(1, 3, 1, CellAttributes::default());
        assert_eq!(grid.line(0).cell(0).display_char(), 'A');
        assert_eq!(grid.line(1).cell(0).display_char(), 'C');
        assert_eq!(grid.line(2).cell(0).display_char(), 'D');
        assert!(grid.line(3).cell(0).is_empty());
        assert_eq!(grid.line(4).cell(0).display_char(), 'E');
    }

    #[test]
    fn test_scroll_up_in_columns() {
        let mut grid = Grid::new(Dimensions::new(4, 3));
        for row in 0..3 {
            for col in 0..4 {
                grid.line_mut(row)
                    .cell_mut(col)
                    .set_char((b'a' + (row * 4 + col) as u8) as char);
            }
        }
        // a b c d      a f g d
        // e f g h  ->  e j k h
        // i j k l      i _ _ l
        grid.scroll_up_in_columns(0, 2, 1, 2, 1, CellAttributes::default());
        assert_eq!(grid.line(0).text(), "afgd");
        assert_eq!(grid.line(1).text(), "ejkh");
        assert_eq!(grid.line(2).cell(0).display_char(), 'i');
        assert!(grid.line(2).cell(1).is_empty());
        assert_eq!(grid.line(2).cell(3).display_char(), 'l');
    }

    #[test]
    fn test_insert_delete_lines() {
        let mut grid = letter_grid(10, 5);
        grid.insert_lines(1, 2, 4, CellAttributes::default());
        assert_eq!(grid.line(0).cell(0).display_char(), 'A');
        assert!(grid.line(1).cell(0).is_empty());
        assert!(grid.line(2).cell(0).is_empty());
        assert_eq!(grid.line(3).cell(0).display_char(), 'B');
        assert_eq!(grid.line(4).cell(0).display_char(), 'C');

        grid.delete_lines(1, 2, 4, CellAttributes::default());
        assert_eq!(grid.line(0).cell(0).display_char(), 'A');
        assert_eq!(grid.line(1).cell(0).display_char(), 'B');
        assert_eq!(grid.line(2).cell(0).display_char(), 'C');
        assert!(grid.line(3).cell(0).is_empty());
    }

    #[test]
    fn test_insert_delete_columns() {
        let mut grid = Grid::new(Dimensions::new(5, 2));
        for row in 0..2 {
            for col in 0..5 {
                grid.line_mut(row)
                    .cell_mut(col)
                    .set_char((b'A' + col as u8) as char);
            }
        }
        grid.insert_columns(0, 1, 1, 1, 4, CellAttributes::default());
        assert_eq!(grid.line(0).text(), "A BCD");
        assert_eq!(grid.line(1).text(), "A BCD");
        grid.delete_columns(0, 1, 1, 1, 4, CellAttributes::default());
        assert_eq!(grid.line(0).text(), "ABCD");
    }

    #[test]
    fn test_resize() {
        let mut grid = Grid::new(Dimensions::new(10, 5));
        grid.line_mut(0).cell_mut(0).set_char('A');
        grid.resize(Dimensions::new(20, 10), CellAttributes::default());
        assert_eq!(grid.cols(), 20);
        assert_eq!(grid.rows(), 10);
        assert_eq!(grid.line(0).cell(0).display_char(), 'A');
    }

    #[test]
    fn test_from_lines_keeps_tail() {
        let mut lines = Vec::new();
        for i in 0..5u8 {
            let mut line = Line::new(4);
            line.cell_mut(0).set_char((b'a' + i) as char);
            lines.push(line);
        }
        let grid = Grid::from_lines(Dimensions::new(4, 3), lines);
        assert_eq!(grid.line(0).cell(0).display_char(), 'c');
        assert_eq!(grid.line(2).cell(0).display_char(), 'e');
    }
}
