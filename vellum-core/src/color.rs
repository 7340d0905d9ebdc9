//! Color representation and the runtime palette
//!
//! Cells store a [`Color`] (default / indexed / 24-bit). The terminal owns a
//! [`ColorPalette`] with the 256 indexed slots and the dynamic colors the
//! program may redefine at runtime (OSC 4/10/11/12/17/19), plus a
//! save/restore stack for the xterm push/pop color operations.

use serde::{Deserialize, Serialize};

/// Color of a cell attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Color {
    /// Default foreground or background
    #[default]
    Default,
    /// Palette color (0-255)
    Indexed(u8),
    /// 24-bit RGB
    Rgb { r: u8, g: u8, b: u8 },
}

impl Color {
    pub fn indexed(index: u8) -> Self {
        Color::Indexed(index)
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb { r, g, b }
    }
}

/// Standard xterm value for a 256-palette index
pub fn index_to_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0 => (0, 0, 0),
        1 => (205, 0, 0),
        2 => (0, 205, 0),
        3 => (205, 205, 0),
        4 => (0, 0, 238),
        5 => (205, 0, 205),
        6 => (0, 205, 205),
        7 => (229, 229, 229),
        8 => (127, 127, 127),
        9 => (255, 0, 0),
        10 => (0, 255, 0),
        11 => (255, 255, 0),
        12 => (92, 92, 255),
        13 => (255, 0, 255),
        14 => (0, 255, 255),
        15 => (255, 255, 255),
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            (level(r), level(g), level(b))
        }
        232..=255 => {
            let gray = 8 + (index - 232) * 10;
            (gray, gray, gray)
        }
    }
}

/// Everything below the indexed colors that OSC sequences can redefine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicColors {
    pub foreground: (u8, u8, u8),
    pub background: (u8, u8, u8),
    pub cursor: (u8, u8, u8),
    pub highlight_background: (u8, u8, u8),
    pub highlight_foreground: (u8, u8, u8),
}

impl Default for DynamicColors {
    fn default() -> Self {
        Self {
            foreground: (212, 212, 212),
            background: (30, 30, 30),
            cursor: (255, 255, 255),
            highlight_background: (70, 70, 120),
            highlight_foreground: (255, 255, 255),
        }
    }
}

/// Runtime palette: 256 indexed slots plus the dynamic colors, with a
/// save/restore stack for XTPUSHCOLORS/XTPOPCOLORS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
    indexed: Vec<(u8, u8, u8)>,
    pub dynamic: DynamicColors,
    stack: Vec<(Vec<(u8, u8, u8)>, DynamicColors)>,
}

/// Cap on the palette stack, matching xterm's limit
const MAX_COLOR_STACK: usize = 10;

impl ColorPalette {
    pub fn new() -> Self {
        Self {
            indexed: (0..=255u8).map(index_to_rgb).collect(),
            dynamic: DynamicColors::default(),
            stack: Vec::new(),
        }
    }

    /// Current value of an indexed slot
    pub fn indexed(&self, index: u8) -> (u8, u8, u8) {
        self.indexed[index as usize]
    }

    pub fn set_indexed(&mut self, index: u8, rgb: (u8, u8, u8)) {
        self.indexed[index as usize] = rgb;
    }

    /// Reset one slot (or all, for `None`) to the standard value
    pub fn reset_indexed(&mut self, index: Option<u8>) {
        match index {
            Some(i) => self.indexed[i as usize] = index_to_rgb(i),
            None => self.indexed = (0..=255u8).map(index_to_rgb).collect(),
        }
    }

    /// Resolve a cell color against this palette
    pub fn resolve(&self, color: Color, is_foreground: bool) -> (u8, u8, u8) {
        match color {
            Color::Default => {
                if is_foreground {
                    self.dynamic.foreground
                } else {
                    self.dynamic.background
                }
            }
            Color::Indexed(i) => self.indexed(i),
            Color::Rgb { r, g, b } => (r, g, b),
        }
    }

    /// XTPUSHCOLORS
    pub fn push(&mut self) {
        if self.stack.len() < MAX_COLOR_STACK {
            self.stack.push((self.indexed.clone(), self.dynamic));
        }
    }

    /// XTPOPCOLORS; false when the stack is empty
    pub fn pop(&mut self) -> bool {
        match self.stack.pop() {
            Some((indexed, dynamic)) => {
                self.indexed = indexed;
                self.dynamic = dynamic;
                true
            }
            None => false,
        }
    }

    /// XTREPORTCOLORS payload: (current depth, max depth)
    pub fn stack_depth(&self) -> (usize, usize) {
        (self.stack.len(), MAX_COLOR_STACK)
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an X11-style color specification as used by OSC 4/10/11/12:
/// `rgb:RR/GG/BB` (1-4 hex digits per channel) or `#RRGGBB`.
pub fn parse_color_spec(spec: &str) -> Option<(u8, u8, u8)> {
    let spec = spec.trim();
    if let Some(body) = spec.strip_prefix("rgb:") {
        let mut channels = body.split('/');
        let r = scale_channel(channels.next()?)?;
        let g = scale_channel(channels.next()?)?;
        let b = scale_channel(channels.next()?)?;
        if channels.next().is_some() {
            return None;
        }
        return Some((r, g, b));
    }
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some((r, g, b));
        }
    }
    None
}

/// Scale a 1-4 hex digit channel to 8 bits
fn scale_channel(digits: &str) -> Option<u8> {
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let value = u16::from_str_radix(digits, 16).ok()?;
    let max = (1u32 << (4 * digits.len() as u32)) - 1;
    Some(((value as u32 * 255 + max / 2) / max) as u8)
}

/// Format an RGB triple the way xterm reports colors: `rgb:RRRR/GGGG/BBBB`
pub fn format_color_spec(rgb: (u8, u8, u8)) -> String {
    let wide = |v: u8| (v as u16) << 8 | v as u16;
    format!(
        "rgb:{:04x}/{:04x}/{:04x}",
        wide(rgb.0),
        wide(rgb.1),
        wide(rgb.2)
    )
}
