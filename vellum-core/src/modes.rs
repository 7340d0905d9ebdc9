//! Terminal mode register
//!
//! ANSI modes (SM/RM) and DEC private modes (DECSET/DECRST). Known modes get
//! named fields; unknown-but-set mode numbers are remembered in a sparse set
//! so that set/query/save/restore stay consistent for modes this emulator
//! does not otherwise act on. Every DEC mode has a save stack for
//! XTSAVE/XTRESTORE.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Mouse reporting protocol (DEC modes 9/1000/1001/1002/1003)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseProtocol {
    #[default]
    None,
    /// Mode 9: button press only
    X10,
    /// Mode 1000: press + release
    Normal,
    /// Mode 1001: highlight tracking
    Highlight,
    /// Mode 1002: press/release/drag
    ButtonEvent,
    /// Mode 1003: any motion
    AnyEvent,
}

/// Mouse coordinate encoding (DEC modes 1005/1006/1015/1016)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseEncoding {
    /// Legacy X10 bytes
    #[default]
    Default,
    /// Mode 1005: UTF-8 extended coordinates
    Utf8,
    /// Mode 1006: SGR
    Sgr,
    /// Mode 1015: URXVT decimal
    Urxvt,
    /// Mode 1016: SGR with pixel coordinates
    SgrPixels,
}

/// Terminal mode flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    // ANSI modes
    /// IRM: printed characters shift the rest of the line right
    pub insert_mode: bool,
    /// LNM: LF implies CR
    pub linefeed_mode: bool,

    // DEC private modes
    /// DECCKM
    pub cursor_keys_application: bool,
    /// DECANM (VT52 compatibility when false)
    pub ansi_mode: bool,
    /// DECCOLM
    pub column_132: bool,
    /// DECSCLM
    pub smooth_scroll: bool,
    /// DECSCNM
    pub reverse_video: bool,
    /// DECOM
    pub origin_mode: bool,
    /// DECAWM
    pub auto_wrap: bool,
    /// DECARM
    pub auto_repeat: bool,
    /// DECTCEM
    pub cursor_visible: bool,
    /// DECLRMM (mode 69): horizontal margins may be set
    pub left_right_margin: bool,
    /// Mode 80: sixel output scrolls the page
    pub sixel_scrolling: bool,
    /// DECKPAM/DECKPNM (not a numbered mode)
    pub app_keypad: bool,

    // Mouse
    pub mouse_protocol: MouseProtocol,
    pub mouse_encoding: MouseEncoding,
    /// Mode 2029: report motion without any button protocol enabled
    pub passive_mouse: bool,

    // xterm extensions
    /// Mode 12
    pub cursor_blink: bool,
    /// Modes 47/1047/1049
    pub alternate_screen: bool,
    /// Mode 1004
    pub focus_events: bool,
    /// Mode 1007
    pub alternate_scroll: bool,
    /// Mode 2004
    pub bracketed_paste: bool,
    /// Mode 2026: batched rendering
    pub synchronized_output: bool,
    /// Mode 2027: grapheme-cluster aware width handling
    pub unicode_core: bool,
    /// Mode 2028: reflow lines on resize
    pub reflow: bool,
    /// Mode 8452: cursor stays next to a completed sixel graphic
    pub sixel_cursor_next_to_graphic: bool,

    /// Unknown DEC modes that were set anyway
    other: BTreeSet<u16>,
    /// XTSAVE stacks, one per DEC mode number
    #[serde(skip)]
    saved: HashMap<u16, Vec<bool>>,
}

impl Modes {
    pub fn new() -> Self {
        Self {
            insert_mode: false,
            linefeed_mode: false,
            cursor_keys_application: false,
            ansi_mode: true,
            column_132: false,
            smooth_scroll: false,
            reverse_video: false,
            origin_mode: false,
            auto_wrap: true,
            auto_repeat: true,
            cursor_visible: true,
            left_right_margin: false,
            sixel_scrolling: true,
            app_keypad: false,
            mouse_protocol: MouseProtocol::None,
            mouse_encoding: MouseEncoding::Default,
            passive_mouse: false,
            cursor_blink: true,
            alternate_screen: false,
            focus_events: false,
            alternate_scroll: false,
            bracketed_paste: false,
            synchronized_output: false,
            unicode_core: false,
            reflow: true,
            sixel_cursor_next_to_graphic: false,
            other: BTreeSet::new(),
            saved: HashMap::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// DECSET/DECRST by mode number
    pub fn set_dec_mode(&mut self, mode: u16, value: bool) {
        match mode {
            1 => self.cursor_keys_application = value,
            2 => self.ansi_mode = value,
            3 => self.column_132 = value,
            4 => self.smooth_scroll = value,
            5 => self.reverse_video = value,
            6 => self.origin_mode = value,
            7 => self.auto_wrap = value,
            8 => self.auto_repeat = value,
            9 => self.set_protocol(MouseProtocol::X10, value),
            12 => self.cursor_blink = value,
            25 => self.cursor_visible = value,
            47 | 1047 | 1049 => self.alternate_screen = value,
            69 => self.left_right_margin = value,
            80 => self.sixel_scrolling = value,
            1000 => self.set_protocol(MouseProtocol::Normal, value),
            1001 => self.set_protocol(MouseProtocol::Highlight, value),
            1002 => self.set_protocol(MouseProtocol::ButtonEvent, value),
            1003 => self.set_protocol(MouseProtocol::AnyEvent, value),
            1004 => self.focus_events = value,
            1005 => self.set_encoding(MouseEncoding::Utf8, value),
            1006 => self.set_encoding(MouseEncoding::Sgr, value),
            1007 => self.alternate_scroll = value,
            1015 => self.set_encoding(MouseEncoding::Urxvt, value),
            1016 => self.set_encoding(MouseEncoding::SgrPixels, value),
            2004 => self.bracketed_paste = value,
            2026 => self.synchronized_output = value,
            2027 => self.unicode_core = value,
            2028 => self.reflow = value,
            2029 => self.passive_mouse = value,
            8452 => self.sixel_cursor_next_to_graphic = value,
            _ => {
                log::debug!("unknown DEC private mode {} (set={})", mode, value);
                if value {
                    self.other.insert(mode);
                } else {
                    self.other.remove(&mode);
                }
            }
        }
    }

    fn set_protocol(&mut self, protocol: MouseProtocol, value: bool) {
        if value {
            self.mouse_protocol = protocol;
        } else if self.mouse_protocol == protocol {
            self.mouse_protocol = MouseProtocol::None;
        }
    }

    fn set_encoding(&mut self, encoding: MouseEncoding, value: bool) {
        if value {
            self.mouse_encoding = encoding;
        } else if self.mouse_encoding == encoding {
            self.mouse_encoding = MouseEncoding::Default;
        }
    }

    /// Current value of a DEC mode
    pub fn get_dec_mode(&self, mode: u16) -> bool {
        match mode {
            1 => self.cursor_keys_application,
            2 => self.ansi_mode,
            3 => self.column_132,
            4 => self.smooth_scroll,
            5 => self.reverse_video,
            6 => self.origin_mode,
            7 => self.auto_wrap,
            8 => self.auto_repeat,
            9 => self.mouse_protocol == MouseProtocol::X10,
            12 => self.cursor_blink,
            25 => self.cursor_visible,
            47 | 1047 | 1049 => self.alternate_screen,
            69 => self.left_right_margin,
            80 => self.sixel_scrolling,
            1000 => self.mouse_protocol == MouseProtocol::Normal,
            1001 => self.mouse_protocol == MouseProtocol::Highlight,
            1002 => self.mouse_protocol == MouseProtocol::ButtonEvent,
            1003 => self.mouse_protocol == MouseProtocol::AnyEvent,
            1004 => self.focus_events,
            1005 => self.mouse_encoding == MouseEncoding::Utf8,
            1006 => self.mouse_encoding == MouseEncoding::Sgr,
            1007 => self.alternate_scroll,
            1015 => self.mouse_encoding == MouseEncoding::Urxvt,
            1016 => self.mouse_encoding == MouseEncoding::SgrPixels,
            2004 => self.bracketed_paste,
            2026 => self.synchronized_output,
            2027 => self.unicode_core,
            2028 => self.reflow,
            2029 => self.passive_mouse,
            8452 => self.sixel_cursor_next_to_graphic,
            _ => self.other.contains(&mode),
        }
    }

    /// Whether this emulator recognizes a DEC mode number
    pub fn dec_mode_known(&self, mode: u16) -> bool {
        matches!(
            mode,
            1 | 2
                | 3
                | 4
                | 5
                | 6
                | 7
                | 8
                | 9
                | 12
                | 25
                | 47
                | 69
                | 80
                | 1000..=1007
                | 1015
                | 1016
                | 1047
                | 1049
                | 2004
                | 2026..=2029
                | 8452
        )
    }

    /// DECRQM (`CSI ? Pd $ p`) answer code: 0 = unrecognized, 1 = set,
    /// 2 = reset
    pub fn report_dec_mode(&self, mode: u16) -> u8 {
        if !self.dec_mode_known(mode) && !self.other.contains(&mode) {
            return 0;
        }
        if self.get_dec_mode(mode) {
            1
        } else {
            2
        }
    }

    /// XTSAVE: push the current value of a mode
    pub fn save_dec_mode(&mut self, mode: u16) {
        let value = self.get_dec_mode(mode);
        self.saved.entry(mode).or_default().push(value);
    }

    /// XTRESTORE: pop and apply a saved value (no-op on empty stack)
    pub fn restore_dec_mode(&mut self, mode: u16) {
        if let Some(value) = self.pop_saved_dec_mode(mode) {
            self.set_dec_mode(mode, value);
        }
    }

    /// Pop a saved value without applying it, for callers that need to run
    /// the mode's side effects themselves
    pub fn pop_saved_dec_mode(&mut self, mode: u16) -> Option<bool> {
        self.saved.get_mut(&mode).and_then(|stack| stack.pop())
    }

    /// SM/RM ANSI mode
    pub fn set_ansi_mode(&mut self, mode: u16, value: bool) {
        match mode {
            4 => self.insert_mode = value,
            20 => self.linefeed_mode = value,
            _ => log::debug!("unknown ANSI mode {} (set={})", mode, value),
        }
    }

    pub fn get_ansi_mode(&self, mode: u16) -> bool {
        match mode {
            4 => self.insert_mode,
            20 => self.linefeed_mode,
            _ => false,
        }
    }

    /// DECRQM for ANSI modes (`CSI Pa $ p`)
    pub fn report_ansi_mode(&self, mode: u16) -> u8 {
        match mode {
            4 | 20 => {
                if self.get_ansi_mode(mode) {
                    1
                } else {
                    2
                }
            }
            _ => 0,
        }
    }

    pub fn mouse_tracking_enabled(&self) -> bool {
        self.mouse_protocol != MouseProtocol::None
    }
}

impl Default for Modes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let modes = Modes::new();
        assert!(modes.auto_wrap);
        assert!(modes.cursor_visible);
        assert!(modes.sixel_scrolling);
        assert!(modes.reflow);
        assert!(!modes.alternate_screen);
    }

    #[test]
    fn test_set_get() {
        let mut modes = Modes::new();
        modes.set_dec_mode(25, false);
        assert!(!modes.get_dec_mode(25));
        modes.set_dec_mode(1049, true);
        assert!(modes.get_dec_mode(1049));
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut modes = Modes::new();
        modes.set_dec_mode(2004, true);
        let snapshot = modes.clone();
        modes.set_dec_mode(2004, true);
        assert_eq!(modes, snapshot);
    }

    #[test]
    fn test_mouse_protocol_switching() {
        let mut modes = Modes::new();
        modes.set_dec_mode(1000, true);
        assert_eq!(modes.mouse_protocol, MouseProtocol::Normal);
        modes.set_dec_mode(1003, true);
        assert_eq!(modes.mouse_protocol, MouseProtocol::AnyEvent);
        // Resetting the inactive protocol does nothing
        modes.set_dec_mode(1000, false);
        assert_eq!(modes.mouse_protocol, MouseProtocol::AnyEvent);
        modes.set_dec_mode(1003, false);
        assert_eq!(modes.mouse_protocol, MouseProtocol::None);
    }

    #[test]
    fn test_unknown_mode_remembered() {
        let mut modes = Modes::new();
        modes.set_dec_mode(4242, true);
        assert!(modes.get_dec_mode(4242));
        assert_eq!(modes.report_dec_mode(4242), 1);
        modes.set_dec_mode(4242, false);
        assert!(!modes.get_dec_mode(4242));
    }

    #[test]
    fn test_save_restore() {
        let mut modes = Modes::new();
        modes.save_dec_mode(25);
        modes.set_dec_mode(25, false);
        modes.set_dec_mode(25, true);
        modes.set_dec_mode(25, false);
        modes.restore_dec_mode(25);
        assert!(modes.get_dec_mode(25));
    }

    #[test]
    fn test_restore_empty_stack() {
        let mut modes = Modes::new();
        modes.set_dec_mode(7, false);
        modes.restore_dec_mode(7);
        assert!(!modes.get_dec_mode(7));
    }

    #[test]
    fn test_rqm_codes() {
        let mut modes = Modes::new();
        assert_eq!(modes.report_dec_mode(25), 1);
        modes.set_dec_mode(25, false);
        assert_eq!(modes.report_dec_mode(25), 2);
        assert_eq!(modes.report_dec_mode(31337), 0);
        assert_eq!(modes.report_ansi_mode(4), 2);
        assert_eq!(modes.report_ansi_mode(99), 0);
    }

    #[test]
    fn test_ansi_modes() {
        let mut modes = Modes::new();
        modes.set_ansi_mode(4, true);
        assert!(modes.insert_mode);
        modes.set_ansi_mode(20, true);
        assert!(modes.linefeed_mode);
    }
}
