//! Input generation: keys, mouse, focus, paste -> PTY bytes
//!
//! Encodes what the embedder's windowing layer reports into the byte
//! sequences the child expects, honoring cursor-key/keypad application
//! modes and the active mouse protocol/encoding.

use vellum_core::modes::{MouseEncoding, MouseProtocol};

/// Keyboard key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    /// xterm modifier parameter (1 = none, 2 = shift, 3 = alt, 5 = ctrl, ...)
    pub fn to_code(&self) -> u8 {
        let mut code = 1u8;
        if self.shift {
            code += 1;
        }
        if self.alt {
            code += 2;
        }
        if self.ctrl {
            code += 4;
        }
        code
    }
}

/// Encode a key press
pub fn encode_key(key: Key, modifiers: Modifiers, app_cursor: bool, app_keypad: bool) -> Vec<u8> {
    let _ = app_keypad;
    match key {
        Key::Char(c) => encode_char(c, modifiers),
        Key::Enter => {
            if modifiers.ctrl {
                vec![0x0A]
            } else {
                vec![0x0D]
            }
        }
        Key::Tab => {
            if modifiers.shift {
                b"\x1b[Z".to_vec()
            } else {
                vec![0x09]
            }
        }
        Key::Backspace => {
            if modifiers.ctrl {
                vec![0x08]
            } else if modifiers.alt {
                vec![0x1B, 0x7F]
            } else {
                vec![0x7F]
            }
        }
        Key::Escape => vec![0x1B],
        Key::Up => encode_cursor_key(b'A', modifiers, app_cursor),
        Key::Down => encode_cursor_key(b'B', modifiers, app_cursor),
        Key::Right => encode_cursor_key(b'C', modifiers, app_cursor),
        Key::Left => encode_cursor_key(b'D', modifiers, app_cursor),
        Key::Home => encode_edit_key(b'H', 1, modifiers, app_cursor),
        Key::End => encode_edit_key(b'F', 4, modifiers, app_cursor),
        Key::PageUp => encode_edit_key(b'~', 5, modifiers, false),
        Key::PageDown => encode_edit_key(b'~', 6, modifiers, false),
        Key::Insert => encode_edit_key(b'~', 2, modifiers, false),
        Key::Delete => encode_edit_key(b'~', 3, modifiers, false),
        Key::F(n) => encode_function_key(n, modifiers),
    }
}

fn encode_char(c: char, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.ctrl {
        if c.is_ascii_alphabetic() {
            let ctrl_char = (c.to_ascii_uppercase() as u8) - b'A' + 1;
            if modifiers.alt {
                return vec![0x1B, ctrl_char];
            }
            return vec![ctrl_char];
        }
        match c {
            '@' => return vec![0x00],
            '[' => return vec![0x1B],
            '\\' => return vec![0x1C],
            ']' => return vec![0x1D],
            '^' => return vec![0x1E],
            '_' => return vec![0x1F],
            '?' => return vec![0x7F],
            _ => {}
        }
    }

    let mut bytes = Vec::with_capacity(5);
    if modifiers.alt {
        bytes.push(0x1B);
    }
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    bytes
}

fn encode_cursor_key(key: u8, modifiers: Modifiers, app_cursor: bool) -> Vec<u8> {
    let code = modifiers.to_code();
    if code > 1 {
        vec![0x1B, b'[', b'1', b';', b'0' + code, key]
    } else if app_cursor {
        vec![0x1B, b'O', key]
    } else {
        vec![0x1B, b'[', key]
    }
}

fn encode_edit_key(final_byte: u8, number: u8, modifiers: Modifiers, app_mode: bool) -> Vec<u8> {
    let code = modifiers.to_code();
    if final_byte == b'~' {
        if code > 1 {
            format!("\x1b[{};{}~", number, code).into_bytes()
        } else {
            format!("\x1b[{}~", number).into_bytes()
        }
    } else if code > 1 {
        vec![0x1B, b'[', b'1', b';', b'0' + code, final_byte]
    } else if app_mode {
        vec![0x1B, b'O', final_byte]
    } else {
        vec![0x1B, b'[', final_byte]
    }
}

fn encode_function_key(n: u8, modifiers: Modifiers) -> Vec<u8> {
    let code = match n {
        1 => 11,
        2 => 12,
        3 => 13,
        4 => 14,
        5 => 15,
        6 => 17,
        7 => 18,
        8 => 19,
        9 => 20,
        10 => 21,
        11 => 23,
        12 => 24,
        _ => return Vec::new(),
    };
    let modifier = modifiers.to_code();
    if modifier > 1 {
        format!("\x1b[{};{}~", code, modifier).into_bytes()
    } else {
        format!("\x1b[{}~", code).into_bytes()
    }
}

/// Mouse event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    Press(MouseButton),
    Release(MouseButton),
    Motion(Option<MouseButton>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

fn button_code(button: MouseButton) -> u16 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::WheelUp => 64,
        MouseButton::WheelDown => 65,
    }
}

/// Encode a mouse event. `cell` is the 0-indexed cell position; `pixel`
/// is used by the SGR-pixels encoding.
pub fn encode_mouse(
    event: MouseEvent,
    cell: (u16, u16),
    pixel: (u16, u16),
    modifiers: Modifiers,
    protocol: MouseProtocol,
    encoding: MouseEncoding,
) -> Vec<u8> {
    if protocol == MouseProtocol::None {
        return Vec::new();
    }

    // Protocol gating: X10 reports presses only; Normal adds releases;
    // ButtonEvent adds drag motion; AnyEvent reports all motion.
    match event {
        MouseEvent::Press(_) => {}
        MouseEvent::Release(_) => {
            if protocol == MouseProtocol::X10 {
                return Vec::new();
            }
        }
        MouseEvent::Motion(button) => match protocol {
            MouseProtocol::AnyEvent => {}
            MouseProtocol::ButtonEvent if button.is_some() => {}
            _ => return Vec::new(),
        },
    }

    let mut code = match event {
        MouseEvent::Press(btn) => button_code(btn),
        MouseEvent::Release(btn) => {
            if encoding == MouseEncoding::Sgr || encoding == MouseEncoding::SgrPixels {
                button_code(btn)
            } else {
                3
            }
        }
        MouseEvent::Motion(btn) => 32 + btn.map(button_code).unwrap_or(3),
    };
    if protocol != MouseProtocol::X10 {
        if modifiers.shift {
            code += 4;
        }
        if modifiers.alt {
            code += 8;
        }
        if modifiers.ctrl {
            code += 16;
        }
    }

    let (col, row) = (cell.0.saturating_add(1), cell.1.saturating_add(1));

    match encoding {
        MouseEncoding::Default => {
            let cb = (code + 32).min(255) as u8;
            let cx = (col.min(223) + 32) as u8;
            let cy = (row.min(223) + 32) as u8;
            vec![0x1B, b'[', b'M', cb, cx, cy]
        }
        MouseEncoding::Utf8 => {
            let cb = (code + 32).min(255) as u8;
            let mut out = vec![0x1B, b'[', b'M', cb];
            encode_utf8_coord(col + 32, &mut out);
            encode_utf8_coord(row + 32, &mut out);
            out
        }
        MouseEncoding::Sgr => {
            let final_byte = match event {
                MouseEvent::Release(_) => 'm',
                _ => 'M',
            };
            format!("\x1b[<{};{};{}{}", code, col, row, final_byte).into_bytes()
        }
        MouseEncoding::SgrPixels => {
            let final_byte = match event {
                MouseEvent::Release(_) => 'm',
                _ => 'M',
            };
            format!(
                "\x1b[<{};{};{}{}",
                code,
                pixel.0.saturating_add(1),
                pixel.1.saturating_add(1),
                final_byte
            )
            .into_bytes()
        }
        MouseEncoding::Urxvt => format!("\x1b[{};{};{}M", code + 32, col, row).into_bytes(),
    }
}

fn encode_utf8_coord(coord: u16, out: &mut Vec<u8>) {
    if coord < 128 {
        out.push(coord as u8);
    } else if coord < 2048 {
        out.push(0xC0 | (coord >> 6) as u8);
        out.push(0x80 | (coord & 0x3F) as u8);
    } else {
        out.push(0xE0 | (coord >> 12) as u8);
        out.push(0x80 | ((coord >> 6) & 0x3F) as u8);
        out.push(0x80 | (coord & 0x3F) as u8);
    }
}

/// Focus in/out reports (mode 1004)
pub fn encode_focus(focused: bool) -> Vec<u8> {
    if focused {
        b"\x1b[I".to_vec()
    } else {
        b"\x1b[O".to_vec()
    }
}

/// Wrap pasted text for bracketed paste mode, filtering the control bytes
/// a hostile paste could use to fake keyboard input
pub fn encode_paste(data: &str, bracketed: bool) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(data.len());
    for &byte in data.as_bytes() {
        if byte >= 0x20 || byte == b'\r' || byte == b'\n' || byte == b'\t' {
            body.push(byte);
        }
    }
    if bracketed {
        let mut out = b"\x1b[200~".to_vec();
        out.extend_from_slice(&body);
        out.extend_from_slice(b"\x1b[201~");
        out
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_char() {
        assert_eq!(encode_char('a', Modifiers::none()), vec![b'a']);
    }

    #[test]
    fn test_ctrl_chars() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        assert_eq!(encode_char('c', ctrl), vec![0x03]);
        assert_eq!(encode_char('a', ctrl), vec![0x01]);
        assert_eq!(encode_char('[', ctrl), vec![0x1B]);
    }

    #[test]
    fn test_alt_prefix() {
        let alt = Modifiers {
            alt: true,
            ..Default::default()
        };
        assert_eq!(encode_char('x', alt), vec![0x1B, b'x']);
    }

    #[test]
    fn test_cursor_keys() {
        let bytes = encode_key(Key::Up, Modifiers::none(), false, false);
        assert_eq!(bytes, b"\x1b[A".to_vec());
        let bytes = encode_key(Key::Up, Modifiers::none(), true, false);
        assert_eq!(bytes, b"\x1bOA".to_vec());
    }

    #[test]
    fn test_cursor_key_with_modifier() {
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        assert_eq!(
            encode_key(Key::Up, shift, false, false),
            b"\x1b[1;2A".to_vec()
        );
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(
            encode_key(Key::F(1), Modifiers::none(), false, false),
            b"\x1b[11~".to_vec()
        );
        assert_eq!(
            encode_key(Key::F(6), Modifiers::none(), false, false),
            b"\x1b[17~".to_vec()
        );
    }

    #[test]
    fn test_mouse_x10_press_only() {
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::Left),
            (0, 0),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::X10,
            MouseEncoding::Default,
        );
        assert_eq!(bytes, vec![0x1B, b'[', b'M', 32, 33, 33]);

        let bytes = encode_mouse(
            MouseEvent::Release(MouseButton::Left),
            (0, 0),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::X10,
            MouseEncoding::Default,
        );
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_mouse_sgr() {
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::Left),
            (10, 20),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::Normal,
            MouseEncoding::Sgr,
        );
        assert_eq!(bytes, b"\x1b[<0;11;21M".to_vec());

        let bytes = encode_mouse(
            MouseEvent::Release(MouseButton::Left),
            (10, 20),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::Normal,
            MouseEncoding::Sgr,
        );
        assert_eq!(bytes, b"\x1b[<0;11;21m".to_vec());
    }

    #[test]
    fn test_mouse_sgr_pixels() {
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::Left),
            (1, 1),
            (37, 52),
            Modifiers::none(),
            MouseProtocol::Normal,
            MouseEncoding::SgrPixels,
        );
        assert_eq!(bytes, b"\x1b[<0;38;53M".to_vec());
    }

    #[test]
    fn test_mouse_motion_gating() {
        let motion = MouseEvent::Motion(None);
        let bytes = encode_mouse(
            motion,
            (0, 0),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::ButtonEvent,
            MouseEncoding::Sgr,
        );
        assert!(bytes.is_empty());

        let bytes = encode_mouse(
            motion,
            (0, 0),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::AnyEvent,
            MouseEncoding::Sgr,
        );
        assert_eq!(bytes, b"\x1b[<35;1;1M".to_vec());
    }

    #[test]
    fn test_wheel_urxvt() {
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::WheelUp),
            (4, 2),
            (0, 0),
            Modifiers::none(),
            MouseProtocol::Normal,
            MouseEncoding::Urxvt,
        );
        assert_eq!(bytes, b"\x1b[96;5;3M".to_vec());
    }

    #[test]
    fn test_focus() {
        assert_eq!(encode_focus(true), b"\x1b[I".to_vec());
        assert_eq!(encode_focus(false), b"\x1b[O".to_vec());
    }

    #[test]
    fn test_paste_bracketed_and_filtered() {
        let bytes = encode_paste("hi\x1b[2J\nthere", true);
        assert_eq!(bytes, b"\x1b[200~hi[2J\nthere\x1b[201~".to_vec());
        let bytes = encode_paste("plain", false);
        assert_eq!(bytes, b"plain".to_vec());
    }
}
