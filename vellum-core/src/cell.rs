//! Terminal cell representation
//!
//! Each cell carries a small grapheme (base character plus any combining
//! marks), its display width, graphic attributes, an optional hyperlink id
//! and an optional image fragment reference.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Underline style variants (SGR 4:x sub-parameters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

impl UnderlineStyle {
    /// Map an SGR `4:N` sub-parameter
    pub fn from_subparam(n: u16) -> Option<Self> {
        match n {
            0 => Some(UnderlineStyle::None),
            1 => Some(UnderlineStyle::Single),
            2 => Some(UnderlineStyle::Double),
            3 => Some(UnderlineStyle::Curly),
            4 => Some(UnderlineStyle::Dotted),
            5 => Some(UnderlineStyle::Dashed),
            _ => None,
        }
    }
}

/// Attributes that affect how a cell is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellAttributes {
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58/59); `Default` means "same as foreground"
    pub underline_color: Color,
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: UnderlineStyle,
    pub blink: bool,
    pub rapid_blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
    pub overline: bool,
    pub framed: bool,
    /// DECSCA protection: selective-erase operations skip this cell
    pub protected: bool,
}

impl CellAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// SGR 0. Protection is not an SGR attribute and survives the reset.
    pub fn reset(&mut self) {
        let protected = self.protected;
        *self = Self::default();
        self.protected = protected;
    }

    /// Effective foreground after accounting for inverse video
    pub fn effective_fg(&self) -> Color {
        if self.inverse {
            self.bg
        } else {
            self.fg
        }
    }

    /// Effective background after accounting for inverse video
    pub fn effective_bg(&self) -> Color {
        if self.inverse {
            self.fg
        } else {
            self.bg
        }
    }
}

/// Reference from a cell to a rectangle of a stored image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFragment {
    /// Image id in the [`crate::image::ImageStore`]
    pub image_id: u32,
    /// Cell-grid offset of this fragment within the image
    pub col: u16,
    pub row: u16,
}

/// A single cell in the terminal grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Grapheme content; empty means blank. Combining marks are appended to
    /// the base character.
    content: String,
    pub attrs: CellAttributes,
    /// Display width: 1 normal, 2 wide, 0 for the spacer behind a wide char
    width: u8,
    /// Hyperlink id (0 = none)
    pub hyperlink_id: u32,
    /// Image fragment shown in this cell, if any
    pub image: Option<ImageFragment>,
}

impl Cell {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            attrs: CellAttributes::default(),
            width: 1,
            hyperlink_id: 0,
            image: None,
        }
    }

    pub fn blank(attrs: CellAttributes) -> Self {
        let mut cell = Self::new();
        cell.attrs = attrs;
        cell
    }

    pub fn with_char(c: char) -> Self {
        let mut cell = Self::new();
        cell.set_char(c);
        cell
    }

    pub fn with_char_and_attrs(c: char, attrs: CellAttributes) -> Self {
        let mut cell = Self::with_char(c);
        cell.attrs = attrs;
        cell
    }

    pub fn set_char(&mut self, c: char) {
        self.content.clear();
        self.content.push(c);
        self.width = char_width(c);
        self.image = None;
    }

    /// Append a zero-width combining mark to the existing grapheme
    pub fn push_combining(&mut self, c: char) {
        if self.content.is_empty() {
            self.content.push(' ');
        }
        self.content.push(c);
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// First character of the grapheme, space if blank
    pub fn display_char(&self) -> char {
        self.content.chars().next().unwrap_or(' ')
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() || self.content == " "
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Turn this cell into the spacer behind a wide character
    pub fn set_continuation(&mut self) {
        self.content.clear();
        self.width = 0;
        self.image = None;
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Blank the cell, keeping the given attributes as the fill
    pub fn clear(&mut self, attrs: CellAttributes) {
        self.content.clear();
        self.attrs = attrs;
        self.width = 1;
        self.hyperlink_id = 0;
        self.image = None;
    }

    pub fn reset(&mut self) {
        self.clear(CellAttributes::default());
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

/// Display width of a character: 2 wide (CJK etc.), 0 combining, 1 otherwise
pub fn char_width(c: char) -> u8 {
    use unicode_width::UnicodeWidthChar;
    match c.width() {
        Some(0) => 0,
        Some(2) => 2,
        _ => 1,
    }
}
