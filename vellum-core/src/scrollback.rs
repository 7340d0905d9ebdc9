//! Scrollback buffer
//!
//! A bounded ring of lines that scrolled off the top of the primary page.
//! The oldest line is evicted once the cap is reached.

use serde::{Deserialize, Serialize};

use crate::line::Line;

/// Default maximum scrollback lines
pub const DEFAULT_SCROLLBACK_SIZE: usize = 10000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scrollback {
    lines: Vec<Line>,
    max_lines: usize,
    /// Ring start once the buffer is full
    start: usize,
}

impl Scrollback {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            max_lines,
            start: 0,
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append a line, evicting the oldest when full
    pub fn push(&mut self, line: Line) {
        if self.max_lines == 0 {
            return;
        }
        if self.lines.len() < self.max_lines {
            self.lines.push(line);
        } else {
            self.lines[self.start] = line;
            self.start = (self.start + 1) % self.max_lines;
        }
    }

    pub fn push_lines(&mut self, lines: Vec<Line>) {
        for line in lines {
            self.push(line);
        }
    }

    /// Line by index (0 = oldest)
    pub fn get(&self, index: usize) -> Option<&Line> {
        if index >= self.lines.len() {
            return None;
        }
        self.lines.get((self.start + index) % self.lines.len())
    }

    /// Line by distance from the end (0 = newest)
    pub fn get_from_end(&self, index: usize) -> Option<&Line> {
        if index >= self.lines.len() {
            return None;
        }
        self.get(self.lines.len() - 1 - index)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.start = 0;
    }

    /// Drain all lines oldest-first, leaving the buffer empty (reflow)
    pub fn drain_ordered(&mut self) -> Vec<Line> {
        let mut out = Vec::with_capacity(self.lines.len());
        for i in 0..self.lines.len() {
            if let Some(line) = self.get(i) {
                out.push(line.clone());
            }
        }
        self.clear();
        out
    }

    /// Change the cap, dropping oldest lines if needed
    pub fn set_max_lines(&mut self, max_lines: usize) {
        if max_lines == self.max_lines {
            return;
        }
        let mut kept = self.drain_ordered();
        if kept.len() > max_lines {
            kept.drain(..kept.len() - max_lines);
        }
        self.lines = kept;
        self.start = 0;
        self.max_lines = max_lines;
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        (0..self.lines.len()).filter_map(move |i| self.get(i))
    }

    /// Iterate newest to oldest
    pub fn iter_rev(&self) -> impl Iterator<Item = &Line> {
        (0..self.lines.len()).filter_map(move |i| self.get_from_end(i))
    }
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellAttributes;

    fn make_line(text: &str) -> Line {
        let mut line = Line::new(text.len().max(10));
        assert!(line.try_append(0, text, CellAttributes::default(), 0));
        line
    }

    #[test]
    fn test_scrollback_push_get() {
        let mut sb = Scrollback::new(100);
        sb.push(make_line("line1"));
        sb.push(make_line("line2"));
        assert_eq!(sb.len(), 2);
        assert_eq!(sb.get(0).map(|l| l.text()), Some("line1".into()));
        assert_eq!(sb.get(1).map(|l| l.text()), Some("line2".into()));
    }

    #[test]
    fn test_scrollback_evicts_oldest() {
        let mut sb = Scrollback::new(3);
        for i in 1..=4 {
            sb.push(make_line(&format!("line{}", i)));
        }
        assert_eq!(sb.len(), 3);
        assert_eq!(sb.get(0).map(|l| l.text()), Some("line2".into()));
        assert_eq!(sb.get(2).map(|l| l.text()), Some("line4".into()));
    }

    #[test]
    fn test_scrollback_get_from_end() {
        let mut sb = Scrollback::new(100);
        for i in 1..=3 {
            sb.push(make_line(&format!("line{}", i)));
        }
        assert_eq!(sb.get_from_end(0).map(|l| l.text()), Some("line3".into()));
        assert_eq!(sb.get_from_end(2).map(|l| l.text()), Some("line1".into()));
    }

    #[test]
    fn test_scrollback_zero_capacity() {
        let mut sb = Scrollback::new(0);
        sb.push(make_line("x"));
        assert!(sb.is_empty());
    }

    #[test]
    fn test_scrollback_iter_order_after_wrap() {
        let mut sb = Scrollback::new(2);
        for i in 1..=3 {
            sb.push(make_line(&format!("line{}", i)));
        }
        let texts: Vec<_> = sb.iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["line2", "line3"]);
        let texts: Vec<_> = sb.iter_rev().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["line3", "line2"]);
    }

    #[test]
    fn test_scrollback_shrink() {
        let mut sb = Scrollback::new(100);
        for i in 0..10 {
            sb.push(make_line(&format!("line{}", i)));
        }
        sb.set_max_lines(5);
        assert_eq!(sb.len(), 5);
        assert_eq!(sb.get(0).map(|l| l.text()), Some("line5".into()));
    }
}
