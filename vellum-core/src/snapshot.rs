//! Serializable screen snapshot
//!
//! A JSON-friendly view of terminal state for golden tests and debugging
//! dumps (OSC 888). This is distinct from the render buffer, which is the
//! hot-path exchange format.

use serde::{Deserialize, Serialize};

use crate::cell::CellAttributes;
use crate::color::Color;
use crate::cursor::CursorStyle;
use crate::line::Line;
use crate::screen::Screen;
use crate::UnderlineStyle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub dimensions: SnapshotDimensions,
    pub cursor: SnapshotCursor,
    pub screen: Vec<SnapshotLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrollback: Option<Vec<SnapshotLine>>,
    pub modes: SnapshotModes,
    pub scroll_region: (usize, usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDimensions {
    pub cols: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCursor {
    pub col: usize,
    pub row: usize,
    pub visible: bool,
    pub style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrapped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<SnapshotAttrSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotAttrSpan {
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotModes {
    pub origin_mode: bool,
    pub auto_wrap: bool,
    pub cursor_visible: bool,
    pub alternate_screen: bool,
    pub bracketed_paste: bool,
    pub insert_mode: bool,
}

impl Snapshot {
    pub fn from_screen(screen: &Screen, include_scrollback: bool) -> Self {
        let dims = screen.dimensions();
        let lines: Vec<SnapshotLine> = screen.grid().iter().map(snapshot_line).collect();
        let scrollback = if include_scrollback {
            Some(screen.scrollback().iter().map(snapshot_line).collect())
        } else {
            None
        };
        let cursor = screen.cursor();
        let modes = screen.modes();

        Self {
            dimensions: SnapshotDimensions {
                cols: dims.cols,
                rows: dims.rows,
            },
            cursor: SnapshotCursor {
                col: cursor.col,
                row: cursor.row,
                visible: cursor.visible,
                style: match cursor.style {
                    CursorStyle::Block => "block".to_string(),
                    CursorStyle::Underline => "underline".to_string(),
                    CursorStyle::Bar => "bar".to_string(),
                },
            },
            screen: lines,
            scrollback,
            modes: SnapshotModes {
                origin_mode: modes.origin_mode,
                auto_wrap: modes.auto_wrap,
                cursor_visible: modes.cursor_visible,
                alternate_screen: modes.alternate_screen,
                bracketed_paste: modes.bracketed_paste,
                insert_mode: modes.insert_mode,
            },
            scroll_region: screen.scroll_region(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Plain text of the visible page
    pub fn screen_text(&self) -> String {
        self.screen
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn snapshot_line(line: &Line) -> SnapshotLine {
    SnapshotLine {
        text: line.text(),
        wrapped: line.flags.wrapped,
        attrs: extract_attr_spans(line),
    }
}

fn color_string(color: Color) -> Option<String> {
    match color {
        Color::Default => None,
        Color::Indexed(idx) => Some(format!("idx:{}", idx)),
        Color::Rgb { r, g, b } => Some(format!("#{:02x}{:02x}{:02x}", r, g, b)),
    }
}

fn span_of(attrs: &CellAttributes, start: usize) -> Option<SnapshotAttrSpan> {
    let underline = attrs.underline != UnderlineStyle::None;
    let notable = attrs.bold
        || attrs.italic
        || underline
        || attrs.inverse
        || attrs.fg != Color::Default
        || attrs.bg != Color::Default;
    if !notable {
        return None;
    }
    Some(SnapshotAttrSpan {
        start,
        end: start,
        fg: color_string(attrs.fg),
        bg: color_string(attrs.bg),
        bold: attrs.bold,
        italic: attrs.italic,
        underline,
        inverse: attrs.inverse,
    })
}

/// Compress per-cell attributes into spans of equal formatting
fn extract_attr_spans(line: &Line) -> Vec<SnapshotAttrSpan> {
    if let Some((text, attrs, _)) = line.trivial_view() {
        return match span_of(&attrs, 0) {
            Some(mut span) if !text.is_empty() => {
                span.end = text.len();
                vec![span]
            }
            _ => Vec::new(),
        };
    }

    let mut spans: Vec<SnapshotAttrSpan> = Vec::new();
    let mut current: Option<SnapshotAttrSpan> = None;
    let cells = line.as_cells().unwrap_or(&[]);
    for (i, cell) in cells.iter().enumerate() {
        if cell.is_continuation() {
            continue;
        }
        match span_of(&cell.attrs, i) {
            None => {
                if let Some(mut span) = current.take() {
                    span.end = i;
                    spans.push(span);
                }
            }
            Some(next) => {
                let matches_current = current.as_ref().is_some_and(|span| {
                    span.fg == next.fg
                        && span.bg == next.bg
                        && span.bold == next.bold
                        && span.italic == next.italic
                        && span.underline == next.underline
                        && span.inverse == next.inverse
                });
                if !matches_current {
                    if let Some(mut span) = current.take() {
                        span.end = i;
                        spans.push(span);
                    }
                    current = Some(next);
                }
            }
        }
    }
    if let Some(mut span) = current {
        span.end = line.cols();
        spans.push(span);
    }
    spans
}
