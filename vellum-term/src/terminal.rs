//! The terminal root object
//!
//! Owns the screen(s), status displays, palette, hyperlinks, selection,
//! title stack and reply buffer, and drives the parser-to-screen pipeline:
//! bytes go in through [`Terminal::process`], sequences are identified via
//! the dispatch table and applied, replies accumulate until
//! [`Terminal::take_replies`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use vellum_core::color::{format_color_spec, parse_color_spec};
use vellum_core::modes::{MouseEncoding, MouseProtocol};
use vellum_core::selection::Point;
use vellum_core::{
    CellAttributes, Color, ColorPalette, CursorStyle, Dimensions, HyperlinkStore, RenderBuffer,
    RenderCell, RenderCursor, RenderLine, Screen, Selection, SelectionMode, Snapshot,
    UnderlineStyle,
};
use vellum_parser::sixel::SixelDecoder;
use vellum_parser::{Action, Params, Parser};

use crate::event::{NullEvents, TerminalEvents};
use crate::input::{self, Key, Modifiers, MouseEvent};
use crate::sequence::{
    lookup, lookup_charset_designation, Category, DispatchResult, FunctionId, Sequence,
};

/// Which display receives dispatched operations (DECSASD)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveDisplay {
    Main,
    StatusLine,
}

/// Status line flavor (DECSSDT)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLineType {
    None,
    Indicator,
    HostWritable,
}

/// Sequence-tracing execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run freely
    Normal,
    /// Hold before each non-print sequence until a step permit arrives
    Waiting,
    /// Hold after every sequence
    SingleStep,
    /// Run until the pending queue drains, then hold
    BreakAtEmptyQueue,
}

/// OSC code used for capture-buffer chunks (PM transport)
const CAPTURE_CHUNK_CODE: u16 = 314;
/// Maximum capture chunk payload
const CAPTURE_CHUNK_SIZE: usize = 4096;

pub struct Terminal {
    screen: Screen,
    /// Host-writable status line (a one-row screen of its own)
    status_screen: Screen,
    active_display: ActiveDisplay,
    status_type: StatusLineType,
    parser: Parser,
    palette: ColorPalette,
    hyperlinks: HyperlinkStore,
    selection: Selection,
    /// Temporary highlight (yank flash), cleared by an external timer
    highlight: Option<(Point, Point)>,
    title: String,
    icon_name: String,
    title_stack: Vec<String>,
    replies: Vec<u8>,
    events: Arc<dyn TerminalEvents>,
    unsupported_logged: HashSet<&'static str>,
    execution_mode: ExecutionMode,
    trace_permits: usize,
    pending_actions: VecDeque<Action>,
    /// DECSCL level; recorded, never enforced
    conformance_level: u16,
    window_pixel_size: (u32, u32),
}

impl Terminal {
    pub fn new(dims: Dimensions) -> Self {
        Self::with_events(dims, Arc::new(NullEvents))
    }

    pub fn with_events(dims: Dimensions, events: Arc<dyn TerminalEvents>) -> Self {
        let dims = dims.sanitized();
        Self {
            screen: Screen::new(dims),
            status_screen: Screen::with_history(Dimensions::new(dims.cols, 1), 0),
            active_display: ActiveDisplay::Main,
            status_type: StatusLineType::None,
            parser: Parser::new(),
            palette: ColorPalette::new(),
            hyperlinks: HyperlinkStore::new(),
            selection: Selection::new(),
            highlight: None,
            title: String::new(),
            icon_name: String::new(),
            title_stack: Vec::new(),
            replies: Vec::new(),
            events,
            unsupported_logged: HashSet::new(),
            execution_mode: ExecutionMode::Normal,
            trace_permits: 0,
            pending_actions: VecDeque::new(),
            conformance_level: 65,
            window_pixel_size: (0, 0),
        }
    }

    // --- accessors ---

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn status_screen(&self) -> &Screen {
        &self.status_screen
    }

    pub fn status_line_type(&self) -> StatusLineType {
        self.status_type
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    pub fn hyperlinks(&self) -> &HyperlinkStore {
        &self.hyperlinks
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon_name(&self) -> &str {
        &self.icon_name
    }

    /// DECSCL level as last requested; recorded only
    pub fn conformance_level(&self) -> u16 {
        self.conformance_level
    }

    pub fn cols(&self) -> usize {
        self.screen.cols()
    }

    pub fn rows(&self) -> usize {
        self.screen.rows()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.screen.snapshot(false)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn set_window_pixel_size(&mut self, width: u32, height: u32) {
        self.window_pixel_size = (width, height);
        let rows = self.rows().max(1) as u32;
        let cols = self.cols().max(1) as u32;
        if width > 0 && height > 0 {
            self.screen
                .set_cell_pixel_size(width / cols, height / rows);
        }
    }

    /// The screen currently receiving operations
    fn scr(&mut self) -> &mut Screen {
        match self.active_display {
            ActiveDisplay::Main => &mut self.screen,
            ActiveDisplay::StatusLine => &mut self.status_screen,
        }
    }

    fn scr_ref(&self) -> &Screen {
        match self.active_display {
            ActiveDisplay::Main => &self.screen,
            ActiveDisplay::StatusLine => &self.status_screen,
        }
    }

    // --- byte pipeline ---

    /// Feed PTY bytes through the parser and dispatch the results
    pub fn process(&mut self, data: &[u8]) {
        let mut actions = VecDeque::new();
        self.parser.parse(data, |action| actions.push_back(action));
        self.pending_actions.append(&mut actions);
        self.drain_pending();
    }

    fn drain_pending(&mut self) {
        while let Some(action) = self.pending_actions.front() {
            let gated = !matches!(action, Action::Print(_) | Action::Text(..));
            if gated && !self.may_execute() {
                return;
            }
            if let Some(action) = self.pending_actions.pop_front() {
                self.handle_action(action);
            }
        }
        if self.execution_mode == ExecutionMode::BreakAtEmptyQueue {
            self.execution_mode = ExecutionMode::Waiting;
        }
    }

    fn may_execute(&mut self) -> bool {
        match self.execution_mode {
            ExecutionMode::Normal | ExecutionMode::BreakAtEmptyQueue => true,
            ExecutionMode::Waiting | ExecutionMode::SingleStep => {
                if self.trace_permits > 0 {
                    self.trace_permits -= 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Tracing: allow the next n held sequences through
    pub fn trace_step(&mut self, permits: usize) {
        self.trace_permits = self.trace_permits.saturating_add(permits);
        self.drain_pending();
    }

    /// Tracing: leave trace mode and drain everything held
    pub fn trace_leave(&mut self) {
        self.execution_mode = ExecutionMode::Normal;
        self.drain_pending();
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.execution_mode = mode;
        if mode == ExecutionMode::Normal {
            self.drain_pending();
        }
    }

    /// True while sequences are held back by the trace gate
    pub fn has_pending_actions(&self) -> bool {
        !self.pending_actions.is_empty()
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Text(text, _cells) => self.scr().write_text(&text),
            Action::Print(c) => self.scr().print(c),
            Action::Execute(byte) => self.execute_control(byte),
            Action::Csi(csi) => {
                let seq = Sequence::from_csi(csi);
                self.dispatch_logged(seq);
            }
            Action::Esc(esc) => {
                let seq = Sequence::from_esc(esc);
                self.dispatch_logged(seq);
            }
            Action::Dcs(dcs) => {
                let seq = Sequence::from_dcs(dcs);
                self.dispatch_logged(seq);
            }
            Action::Osc(data) => self.handle_osc(&data),
            Action::Apc(_) | Action::Pm(_) | Action::Sos(_) => {
                log::trace!("ignored string sequence");
            }
        }
    }

    fn execute_control(&mut self, byte: u8) {
        match byte {
            0x07 => self.events.on_bell(),
            0x08 => self.scr().backspace(),
            0x09 => self.scr().tab_forward(1),
            0x0A..=0x0C => self.scr().linefeed(),
            0x0D => self.scr().carriage_return(),
            0x0E => self.scr().shift_out(),
            0x0F => self.scr().shift_in(),
            _ => log::trace!("unhandled C0 control 0x{:02X}", byte),
        }
    }

    fn dispatch_logged(&mut self, seq: Sequence) {
        match self.dispatch(&seq) {
            DispatchResult::Ok => {}
            DispatchResult::Invalid => {
                log::info!(
                    "invalid sequence: {:?} leader={:?} intermediates={:?} final={}",
                    seq.category,
                    seq.leader as char,
                    seq.intermediates,
                    seq.final_byte as char
                );
            }
            DispatchResult::Unsupported => {
                if let Some(def) = lookup(&seq) {
                    if self.unsupported_logged.insert(def.name) {
                        log::info!("unsupported sequence: {}", def.name);
                    }
                }
            }
        }
    }

    /// Identify and execute one sequence
    fn dispatch(&mut self, seq: &Sequence) -> DispatchResult {
        // Charset designations carry the slot in the intermediate byte
        if seq.category == Category::Esc {
            if let Some(id) = lookup_charset_designation(&seq.intermediates) {
                let slot = match id {
                    FunctionId::SCS_G0 => 0,
                    FunctionId::SCS_G1 => 1,
                    FunctionId::SCS_G2 => 2,
                    _ => 3,
                };
                self.scr()
                    .designate_charset(slot, seq.final_byte as char);
                return DispatchResult::Ok;
            }
        }

        let Some(def) = lookup(seq) else {
            log::debug!(
                "unknown sequence: {:?} leader={} intermediates={:?} final={}",
                seq.category,
                seq.leader,
                seq.intermediates,
                seq.final_byte as char
            );
            return DispatchResult::Ok;
        };

        match def.id {
            // Cursor motion
            FunctionId::CUU => self.scr().move_cursor_up(seq.param(0, 1) as usize),
            FunctionId::CUD | FunctionId::VPR => {
                self.scr().move_cursor_down(seq.param(0, 1) as usize)
            }
            FunctionId::CUF | FunctionId::HPR => {
                self.scr().move_cursor_right(seq.param(0, 1) as usize)
            }
            FunctionId::CUB => self.scr().move_cursor_left(seq.param(0, 1) as usize),
            FunctionId::CNL => {
                self.scr().move_cursor_down(seq.param(0, 1) as usize);
                self.scr().carriage_return();
            }
            FunctionId::CPL => {
                self.scr().move_cursor_up(seq.param(0, 1) as usize);
                self.scr().carriage_return();
            }
            FunctionId::CHA | FunctionId::HPA => {
                self.scr().set_cursor_col(seq.param(0, 1) as usize)
            }
            FunctionId::CUP | FunctionId::HVP => {
                let row = seq.param(0, 1) as usize;
                let col = seq.param(1, 1) as usize;
                self.scr().move_cursor_to(row, col);
            }
            FunctionId::VPA => self.scr().set_cursor_row(seq.param(0, 1) as usize),
            FunctionId::CHT => self.scr().tab_forward(seq.param(0, 1) as usize),
            FunctionId::CBT => self.scr().tab_backward(seq.param(0, 1) as usize),

            // Erase / edit
            FunctionId::ED => {
                let mode = seq.params.raw(0).unwrap_or(0);
                self.scr().erase_display(mode);
            }
            FunctionId::EL => {
                let mode = seq.params.raw(0).unwrap_or(0);
                self.scr().erase_line(mode);
            }
            FunctionId::DECSED => {
                let mode = seq.params.raw(0).unwrap_or(0);
                self.scr().erase_display_selective(mode);
            }
            FunctionId::DECSEL => {
                let mode = seq.params.raw(0).unwrap_or(0);
                self.scr().erase_line_selective(mode);
            }
            FunctionId::ECH => self.scr().erase_chars(seq.param(0, 1) as usize),
            FunctionId::ICH => self.scr().insert_chars(seq.param(0, 1) as usize),
            FunctionId::DCH => self.scr().delete_chars(seq.param(0, 1) as usize),
            FunctionId::IL => self.scr().insert_lines(seq.param(0, 1) as usize),
            FunctionId::DL => self.scr().delete_lines(seq.param(0, 1) as usize),
            FunctionId::SU => {
                let n = seq.param(0, 1) as usize;
                let pushed = self.scr().scroll_up(n);
                if pushed > 0 {
                    self.events.on_scrollback(pushed);
                }
            }
            FunctionId::SD => self.scr().scroll_down(seq.param(0, 1) as usize),

            // Attributes and modes
            FunctionId::SGR => {
                let params = seq.params.clone();
                apply_sgr(&params, &mut self.scr().cursor_mut().attrs);
            }
            FunctionId::SM => {
                for mode in seq.params.iter() {
                    self.screen.modes_mut().set_ansi_mode(mode, true);
                }
            }
            FunctionId::RM => {
                for mode in seq.params.iter() {
                    self.screen.modes_mut().set_ansi_mode(mode, false);
                }
            }
            FunctionId::DECSET => {
                let modes: Vec<u16> = seq.params.iter().collect();
                for mode in modes {
                    self.set_dec_mode(mode, true);
                }
            }
            FunctionId::DECRST => {
                let modes: Vec<u16> = seq.params.iter().collect();
                for mode in modes {
                    self.set_dec_mode(mode, false);
                }
            }
            FunctionId::DECRQM => {
                let mode = seq.params.raw(0).unwrap_or(0);
                let code = self.screen.modes().report_ansi_mode(mode);
                self.reply(format!("\x1b[{};{}$y", mode, code));
            }
            FunctionId::DECRQM_DEC => {
                let mode = seq.params.raw(0).unwrap_or(0);
                let code = self.screen.modes().report_dec_mode(mode);
                self.reply(format!("\x1b[?{};{}$y", mode, code));
            }
            FunctionId::XTSAVE => {
                for mode in seq.params.iter() {
                    self.screen.modes_mut().save_dec_mode(mode);
                }
            }
            FunctionId::XTRESTORE => {
                let modes: Vec<u16> = seq.params.iter().collect();
                for mode in modes {
                    if let Some(value) = self.screen.modes_mut().pop_saved_dec_mode(mode) {
                        self.set_dec_mode(mode, value);
                    }
                }
            }

            // Margins
            FunctionId::DECSTBM => {
                let rows = self.scr_ref().rows();
                let top = seq.param(0, 1) as usize;
                let bottom = seq.param(1, rows as u16) as usize;
                self.scr().set_scroll_region(top, bottom);
            }
            FunctionId::DECSLRM => {
                if self.screen.modes().left_right_margin {
                    let cols = self.scr_ref().cols();
                    let left = seq.param(0, 1) as usize;
                    let right = seq.param(1, cols as u16) as usize;
                    self.scr().set_lr_margins(left, right);
                } else {
                    // Plain `CSI s` without DECLRMM is the ANSI.SYS save
                    self.scr().save_cursor();
                }
            }
            FunctionId::SCOSC => self.scr().save_cursor(),
            FunctionId::SCORC => self.scr().restore_cursor(),

            // Reports
            FunctionId::DSR => match seq.params.raw(0).unwrap_or(0) {
                5 => self.reply("\x1b[0n".to_string()),
                6 => {
                    let (row, col) = self.cursor_report_position();
                    self.reply(format!("\x1b[{};{}R", row, col));
                }
                other => {
                    log::debug!("unhandled DSR {}", other);
                    return DispatchResult::Unsupported;
                }
            },
            FunctionId::DSR_DEC => match seq.params.raw(0).unwrap_or(0) {
                6 => {
                    let (row, col) = self.cursor_report_position();
                    self.reply(format!("\x1b[?{};{}R", row, col));
                }
                15 => self.reply("\x1b[?13n".to_string()),
                other => {
                    log::debug!("unhandled DEC DSR {}", other);
                    return DispatchResult::Unsupported;
                }
            },
            FunctionId::DA1 => self.reply("\x1b[?62;4;6;22c".to_string()),
            FunctionId::DA2 => self.reply("\x1b[>61;30;0c".to_string()),
            FunctionId::DA3 => self.reply("\x1bP!|00000000\x1b\\".to_string()),

            // Tabs
            FunctionId::TBC => {
                let mode = seq.params.raw(0).unwrap_or(0);
                self.scr().clear_tab_stop(mode);
            }

            // Window ops, versions, capture
            FunctionId::WINMANIP => return self.window_manip(seq),
            FunctionId::XTVERSION => {
                self.reply(format!(
                    "\x1bP>|vellum({})\x1b\\",
                    env!("CARGO_PKG_VERSION")
                ));
            }
            FunctionId::XTCAPTURE => {
                let logical = seq.params.raw(0).unwrap_or(0) == 1;
                let count = seq.param(1, self.rows() as u16) as usize;
                self.capture_buffer(logical, count);
            }
            FunctionId::XTSMGRAPHICS => return self.xt_smgraphics(seq),
            FunctionId::XTPUSHCOLORS => self.palette.push(),
            FunctionId::XTPOPCOLORS => {
                if !self.palette.pop() {
                    return DispatchResult::Invalid;
                }
            }
            FunctionId::XTREPORTCOLORS => {
                let (depth, max) = self.palette.stack_depth();
                self.reply(format!("\x1b[?{};{}#Q", depth, max));
            }

            // DEC extended
            FunctionId::DECSCUSR => {
                let style = seq.params.raw(0).unwrap_or(0);
                let cursor = self.scr().cursor_mut();
                match style {
                    0 | 1 => {
                        cursor.style = CursorStyle::Block;
                        cursor.blinking = true;
                    }
                    2 => {
                        cursor.style = CursorStyle::Block;
                        cursor.blinking = false;
                    }
                    3 => {
                        cursor.style = CursorStyle::Underline;
                        cursor.blinking = true;
                    }
                    4 => {
                        cursor.style = CursorStyle::Underline;
                        cursor.blinking = false;
                    }
                    5 => {
                        cursor.style = CursorStyle::Bar;
                        cursor.blinking = true;
                    }
                    6 => {
                        cursor.style = CursorStyle::Bar;
                        cursor.blinking = false;
                    }
                    _ => return DispatchResult::Invalid,
                }
            }
            FunctionId::DECSTR => self.screen.soft_reset(),
            FunctionId::DECSCA => {
                let protect = seq.params.raw(0).unwrap_or(0) == 1;
                self.scr().cursor_mut().attrs.protected = protect;
            }
            FunctionId::DECSCL => {
                self.conformance_level = seq.params.raw(0).unwrap_or(65);
            }
            FunctionId::DECCARA => {
                let (top, left, bottom, right) = self.rect_params(seq);
                let sgr: Vec<u16> = seq.params.iter().skip(4).collect();
                let sgr_params = Params::from_slice(&sgr);
                self.scr()
                    .change_rect_attrs(top, left, bottom, right, &move |attrs| {
                        apply_sgr(&sgr_params, attrs)
                    });
            }
            FunctionId::DECCRA => {
                let (top, left, bottom, right) = self.rect_params(seq);
                let dst_top = seq.param(5, 1) as usize;
                let dst_left = seq.param(6, 1) as usize;
                self.scr()
                    .copy_rect(top, left, bottom, right, dst_top, dst_left);
            }
            FunctionId::DECERA => {
                let (top, left, bottom, right) = self.rect_params(seq);
                self.scr().erase_rect(top, left, bottom, right);
            }
            FunctionId::DECSERA => {
                let (top, left, bottom, right) = self.rect_params(seq);
                self.scr().erase_rect_selective(top, left, bottom, right);
            }
            FunctionId::DECFRA => {
                let code = seq.params.raw(0).unwrap_or(0) as u32;
                if !(32..=126).contains(&code) && !(160..=255).contains(&code) {
                    return DispatchResult::Invalid;
                }
                let Some(fill) = char::from_u32(code) else {
                    return DispatchResult::Invalid;
                };
                let rows = self.scr_ref().rows() as u16;
                let cols = self.scr_ref().cols() as u16;
                let top = seq.param(1, 1) as usize;
                let left = seq.param(2, 1) as usize;
                let bottom = seq.param(3, rows) as usize;
                let right = seq.param(4, cols) as usize;
                self.scr().fill_rect(fill, top, left, bottom, right);
            }
            FunctionId::DECIC => self.scr().insert_columns(seq.param(0, 1) as usize),
            FunctionId::DECDC => self.scr().delete_columns(seq.param(0, 1) as usize),
            FunctionId::DECRQPSR => match seq.params.raw(0).unwrap_or(0) {
                2 => {
                    let stops: Vec<String> = self
                        .scr_ref()
                        .tab_stop_columns()
                        .into_iter()
                        .map(|col| (col + 1).to_string())
                        .collect();
                    self.reply(format!("\x1bP2$u{}\x1b\\", stops.join("/")));
                }
                _ => {
                    self.reply("\x1bP0$u\x1b\\".to_string());
                    return DispatchResult::Unsupported;
                }
            },
            FunctionId::DECSCPP => {
                let cols = match seq.params.raw(0).unwrap_or(0) {
                    0 | 80 => 80,
                    132 => 132,
                    _ => return DispatchResult::Invalid,
                };
                let rows = self.rows();
                self.resize_screen(cols, rows, None);
            }
            FunctionId::DECSNLS | FunctionId::DECSLPP => {
                let rows = seq.param(0, 24) as usize;
                let cols = self.cols();
                self.resize_screen(cols, rows.clamp(1, 500), None);
            }
            FunctionId::DECSASD => match seq.params.raw(0).unwrap_or(0) {
                0 => self.active_display = ActiveDisplay::Main,
                1 => {
                    if self.status_type == StatusLineType::HostWritable {
                        self.active_display = ActiveDisplay::StatusLine;
                    }
                }
                _ => return DispatchResult::Invalid,
            },
            FunctionId::DECSSDT => {
                self.status_type = match seq.params.raw(0).unwrap_or(0) {
                    0 => StatusLineType::None,
                    1 => StatusLineType::Indicator,
                    2 => StatusLineType::HostWritable,
                    _ => return DispatchResult::Invalid,
                };
                if self.status_type != StatusLineType::HostWritable {
                    self.active_display = ActiveDisplay::Main;
                }
            }
            FunctionId::DECPS => return DispatchResult::Unsupported,

            // ESC repertoire
            FunctionId::DECSC => self.scr().save_cursor(),
            FunctionId::DECRC => self.scr().restore_cursor(),
            FunctionId::IND => self.scr().index(),
            FunctionId::NEL => self.scr().next_line(),
            FunctionId::HTS => self.scr().set_tab_stop(),
            FunctionId::RI => self.scr().reverse_index(),
            FunctionId::SS2 => self.scr().cursor_mut().charset.single_shift_2(),
            FunctionId::SS3 => self.scr().cursor_mut().charset.single_shift_3(),
            FunctionId::RIS => self.hard_reset(),
            FunctionId::DECKPAM => self.screen.modes_mut().app_keypad = true,
            FunctionId::DECKPNM => self.screen.modes_mut().app_keypad = false,
            FunctionId::DECALN => self.scr().alignment_pattern(),
            FunctionId::DECBI => self.scr().back_index(),
            FunctionId::DECFI => self.scr().forward_index(),
            FunctionId::LS2 => self.scr().cursor_mut().charset.lock_shift(2),
            FunctionId::LS3 => self.scr().cursor_mut().charset.lock_shift(3),
            FunctionId::SCS_G0 | FunctionId::SCS_G1 | FunctionId::SCS_G2 | FunctionId::SCS_G3 => {
                // Handled structurally before the table lookup
            }

            // DCS repertoire
            FunctionId::DECSIXEL => {
                let background_mode = seq.params.raw(1).unwrap_or(0);
                match SixelDecoder::decode(background_mode, &seq.payload) {
                    Some(image) => self.scr().place_image(image),
                    None => return DispatchResult::Invalid,
                }
            }
            FunctionId::DECRQSS => return self.decrqss(&seq.payload),
            FunctionId::XTGETTCAP => return self.xtgettcap(&seq.payload),
            FunctionId::STP => return DispatchResult::Unsupported,
        }
        DispatchResult::Ok
    }

    /// Rectangle parameters common to the DEC rectangular ops (1-indexed)
    fn rect_params(&self, seq: &Sequence) -> (usize, usize, usize, usize) {
        let rows = self.scr_ref().rows() as u16;
        let cols = self.scr_ref().cols() as u16;
        (
            seq.param(0, 1) as usize,
            seq.param(1, 1) as usize,
            seq.param(2, rows) as usize,
            seq.param(3, cols) as usize,
        )
    }

    /// Cursor position for CPR/DECXCPR, origin-mode relative when set
    fn cursor_report_position(&self) -> (usize, usize) {
        let screen = self.scr_ref();
        let cursor = screen.cursor();
        if cursor.origin_mode {
            let (top, _) = screen.scroll_region();
            let (left, _) = screen.lr_margins();
            (
                cursor.row.saturating_sub(top) + 1,
                cursor.col.saturating_sub(left) + 1,
            )
        } else {
            (cursor.row + 1, cursor.col + 1)
        }
    }

    fn window_manip(&mut self, seq: &Sequence) -> DispatchResult {
        let op = seq.params.raw(0).unwrap_or(0);
        match op {
            14 => {
                let (w, h) = self.window_pixel_size;
                self.reply(format!("\x1b[4;{};{}t", h, w));
            }
            16 => {
                let (w, h) = self.screen.cell_pixel_size();
                self.reply(format!("\x1b[6;{};{}t", h, w));
            }
            18 => {
                let reply = format!("\x1b[8;{};{}t", self.rows(), self.cols());
                self.reply(reply);
            }
            22 => {
                self.title_stack.push(self.title.clone());
            }
            23 => {
                if let Some(title) = self.title_stack.pop() {
                    self.title = title;
                    self.events.on_set_window_title(&self.title);
                }
            }
            n if n >= 24 => {
                // DECSLPP: set lines per page
                let cols = self.cols();
                self.resize_screen(cols, (n as usize).min(500), None);
            }
            other => {
                log::debug!("unhandled window op {}", other);
                return DispatchResult::Unsupported;
            }
        }
        DispatchResult::Ok
    }

    fn xt_smgraphics(&mut self, seq: &Sequence) -> DispatchResult {
        let item = seq.params.raw(0).unwrap_or(0);
        let action = seq.params.raw(1).unwrap_or(0);
        if action != 1 {
            // Only reads are supported; writes acknowledge with an error
            self.reply(format!("\x1b[?{};3;0S", item));
            return DispatchResult::Ok;
        }
        match item {
            1 => self.reply("\x1b[?1;0;256S".to_string()),
            2 => self.reply("\x1b[?2;0;4096;4096S".to_string()),
            _ => self.reply(format!("\x1b[?{};1;0S", item)),
        }
        DispatchResult::Ok
    }

    // --- mode handling with side effects ---

    fn set_dec_mode(&mut self, mode: u16, value: bool) {
        match mode {
            3 => {
                // DECCOLM resizes, clears and homes
                self.screen.modes_mut().set_dec_mode(3, value);
                let cols = if value { 132 } else { 80 };
                let rows = self.rows();
                self.resize_screen(cols, rows, None);
                self.screen.erase_display(2);
                self.screen.move_cursor_to(1, 1);
            }
            6 => {
                self.screen.modes_mut().set_dec_mode(6, value);
                self.screen.cursor_mut().origin_mode = value;
                self.screen.move_cursor_to(1, 1);
            }
            12 => {
                self.screen.modes_mut().set_dec_mode(12, value);
                self.screen.cursor_mut().blinking = value;
            }
            25 => {
                self.screen.modes_mut().set_dec_mode(25, value);
                self.screen.cursor_mut().visible = value;
            }
            47 => {
                self.screen.modes_mut().set_dec_mode(47, value);
                if value {
                    self.screen.enter_alternate_screen(false);
                } else {
                    self.screen.exit_alternate_screen();
                }
            }
            69 => {
                self.screen.modes_mut().set_dec_mode(69, value);
                if !value {
                    self.screen.reset_margins();
                }
            }
            1047 => {
                self.screen.modes_mut().set_dec_mode(1047, value);
                if value {
                    self.screen.enter_alternate_screen(true);
                } else {
                    self.screen.exit_alternate_screen();
                }
            }
            1048 => {
                if value {
                    self.screen.save_cursor();
                } else {
                    self.screen.restore_cursor();
                }
            }
            1049 => {
                self.screen.modes_mut().set_dec_mode(1049, value);
                if value {
                    self.screen.save_cursor();
                    self.screen.enter_alternate_screen(true);
                } else {
                    self.screen.exit_alternate_screen();
                    self.screen.restore_cursor();
                }
            }
            _ => self.screen.modes_mut().set_dec_mode(mode, value),
        }
    }

    // --- OSC ---

    fn handle_osc(&mut self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let (command, payload) = match text.find(';') {
            Some(pos) => (&text[..pos], &text[pos + 1..]),
            None => (text.as_ref(), ""),
        };
        let Ok(command) = command.parse::<u16>() else {
            log::debug!("malformed OSC: {:?}", text);
            return;
        };

        match command {
            0 => {
                self.icon_name = payload.to_string();
                self.set_title(payload);
            }
            1 => self.icon_name = payload.to_string(),
            2 => self.set_title(payload),
            4 => self.osc_color_pairs(payload),
            7 => self.events.on_set_working_directory(payload),
            8 => self.osc_hyperlink(payload),
            10 => self.osc_dynamic_color(10, payload),
            11 => self.osc_dynamic_color(11, payload),
            12 => self.osc_dynamic_color(12, payload),
            17 => self.osc_dynamic_color(17, payload),
            19 => self.osc_dynamic_color(19, payload),
            50 | 60 => log::debug!("font OSC {} ignored: {}", command, payload),
            52 => self.osc_clipboard(payload),
            104 => {
                if payload.is_empty() {
                    self.palette.reset_indexed(None);
                } else {
                    for part in payload.split(';') {
                        if let Ok(index) = part.parse::<u8>() {
                            self.palette.reset_indexed(Some(index));
                        }
                    }
                }
            }
            110 => self.palette.dynamic.foreground = Self::default_dynamic().foreground,
            111 => self.palette.dynamic.background = Self::default_dynamic().background,
            112 => self.palette.dynamic.cursor = Self::default_dynamic().cursor,
            117 => {
                self.palette.dynamic.highlight_background =
                    Self::default_dynamic().highlight_background
            }
            119 => {
                self.palette.dynamic.highlight_foreground =
                    Self::default_dynamic().highlight_foreground
            }
            777 => {
                let mut parts = payload.splitn(3, ';');
                if parts.next() == Some("notify") {
                    let title = parts.next().unwrap_or("");
                    let body = parts.next().unwrap_or("");
                    self.events.on_notify(title, body);
                }
            }
            888 => match self.snapshot().to_json() {
                Ok(json) => log::debug!("state dump: {}", json),
                Err(e) => log::debug!("state dump failed: {}", e),
            },
            other => log::debug!("unhandled OSC {}: {}", other, payload),
        }
    }

    fn default_dynamic() -> vellum_core::color::DynamicColors {
        vellum_core::color::DynamicColors::default()
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.chars().take(4096).collect();
        self.events.on_set_window_title(&self.title);
    }

    /// OSC 4: `index;spec` pairs; `?` specs are queries
    fn osc_color_pairs(&mut self, payload: &str) {
        let mut parts = payload.split(';');
        while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
            let Ok(index) = index.parse::<u8>() else {
                continue;
            };
            if spec == "?" {
                let rgb = self.palette.indexed(index);
                self.reply(format!("\x1b]4;{};{}\x1b\\", index, format_color_spec(rgb)));
            } else if let Some(rgb) = parse_color_spec(spec) {
                self.palette.set_indexed(index, rgb);
            }
        }
    }

    fn osc_dynamic_color(&mut self, command: u16, payload: &str) {
        if payload == "?" {
            let rgb = match command {
                10 => self.palette.dynamic.foreground,
                11 => self.palette.dynamic.background,
                12 => self.palette.dynamic.cursor,
                17 => self.palette.dynamic.highlight_background,
                _ => self.palette.dynamic.highlight_foreground,
            };
            self.reply(format!("\x1b]{};{}\x1b\\", command, format_color_spec(rgb)));
            return;
        }
        if let Some(rgb) = parse_color_spec(payload) {
            match command {
                10 => self.palette.dynamic.foreground = rgb,
                11 => self.palette.dynamic.background = rgb,
                12 => self.palette.dynamic.cursor = rgb,
                17 => self.palette.dynamic.highlight_background = rgb,
                _ => self.palette.dynamic.highlight_foreground = rgb,
            }
        }
    }

    /// OSC 8: `params;uri` where params may carry `id=`
    fn osc_hyperlink(&mut self, payload: &str) {
        let (params, uri) = match payload.split_once(';') {
            Some(pair) => pair,
            None => ("", payload),
        };
        if uri.is_empty() {
            self.scr().cursor_mut().hyperlink_id = 0;
            return;
        }
        let user_id = params
            .split(':')
            .find_map(|p| p.strip_prefix("id="))
            .unwrap_or("");
        let id = self.hyperlinks.acquire(user_id, uri);
        self.scr().cursor_mut().hyperlink_id = id;
    }

    /// OSC 52: surfaced to the embedder; the payload stays base64 and
    /// queries are refused, both deliberate
    fn osc_clipboard(&mut self, payload: &str) {
        let (target, data) = match payload.split_once(';') {
            Some(pair) => pair,
            None => ("c", payload),
        };
        if data == "?" {
            log::debug!("OSC 52 clipboard query refused");
            return;
        }
        let target = if target.contains('p') {
            "primary"
        } else {
            "clipboard"
        };
        self.events.on_copy_to_clipboard(target, data.as_bytes());
    }

    // --- DCS handlers ---

    fn decrqss(&mut self, payload: &[u8]) -> DispatchResult {
        let request = String::from_utf8_lossy(payload);
        let answer = match request.as_ref() {
            "m" => Some(format!("{}m", sgr_string(&self.scr_ref().cursor().attrs))),
            " q" => {
                let cursor = self.scr_ref().cursor();
                let style = match (cursor.style, cursor.blinking) {
                    (CursorStyle::Block, true) => 1,
                    (CursorStyle::Block, false) => 2,
                    (CursorStyle::Underline, true) => 3,
                    (CursorStyle::Underline, false) => 4,
                    (CursorStyle::Bar, true) => 5,
                    (CursorStyle::Bar, false) => 6,
                };
                Some(format!("{} q", style))
            }
            "r" => {
                let (top, bottom) = self.scr_ref().scroll_region();
                Some(format!("{};{}r", top + 1, bottom + 1))
            }
            "s" => {
                let (left, right) = self.scr_ref().lr_margins();
                Some(format!("{};{}s", left + 1, right + 1))
            }
            "$|" => Some(format!("{}$|", self.cols())),
            "*|" => Some(format!("{}*|", self.rows())),
            "$}" => {
                let active = match self.active_display {
                    ActiveDisplay::Main => 0,
                    ActiveDisplay::StatusLine => 1,
                };
                Some(format!("{}$}}", active))
            }
            "$~" => {
                let status = match self.status_type {
                    StatusLineType::None => 0,
                    StatusLineType::Indicator => 1,
                    StatusLineType::HostWritable => 2,
                };
                Some(format!("{}$~", status))
            }
            _ => None,
        };
        match answer {
            Some(text) => {
                self.reply(format!("\x1bP1$r{}\x1b\\", text));
                DispatchResult::Ok
            }
            None => {
                self.reply("\x1bP0$r\x1b\\".to_string());
                log::debug!("unknown DECRQSS request: {:?}", request);
                DispatchResult::Invalid
            }
        }
    }

    fn xtgettcap(&mut self, payload: &[u8]) -> DispatchResult {
        let text = String::from_utf8_lossy(payload);
        for encoded in text.split(';') {
            let Some(name) = hex_decode(encoded) else {
                self.reply("\x1bP0+r\x1b\\".to_string());
                continue;
            };
            let value = match name.as_str() {
                "TN" | "name" => Some("xterm-256color".to_string()),
                "Co" | "colors" => Some("256".to_string()),
                "RGB" => Some("8/8/8".to_string()),
                _ => None,
            };
            match value {
                Some(value) => self.reply(format!(
                    "\x1bP1+r{}={}\x1b\\",
                    hex_encode(&name),
                    hex_encode(&value)
                )),
                None => self.reply(format!("\x1bP0+r{}\x1b\\", hex_encode(&name))),
            }
        }
        DispatchResult::Ok
    }

    // --- capture buffer ---

    /// Stream the last `count` lines back through PM-wrapped chunks
    fn capture_buffer(&mut self, with_history: bool, count: usize) {
        let mut lines: Vec<String> = Vec::new();
        if with_history {
            for line in self.screen.scrollback().iter() {
                lines.push(line.text());
            }
        }
        for line in self.screen.grid().iter() {
            lines.push(line.text());
        }
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        let keep = lines.len().saturating_sub(count);
        let text = lines[keep..].join("\n");

        let bytes = text.as_bytes();
        let mut offset = 0;
        while offset < bytes.len() {
            let mut end = (offset + CAPTURE_CHUNK_SIZE).min(bytes.len());
            // Stay on a UTF-8 boundary
            while end > offset && (bytes[end - 1] & 0xC0) == 0x80 {
                end -= 1;
            }
            let chunk = String::from_utf8_lossy(&bytes[offset..end]);
            self.reply(format!("\x1b^{};{}\x1b\\", CAPTURE_CHUNK_CODE, chunk));
            offset = end;
        }
        // Empty chunk terminates the transfer
        self.reply(format!("\x1b^{};\x1b\\", CAPTURE_CHUNK_CODE));
    }

    // --- replies ---

    fn reply(&mut self, text: String) {
        self.replies.extend_from_slice(text.as_bytes());
    }

    /// Drain the reply buffer for flushing to the PTY
    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }

    // --- reset / resize ---

    /// RIS: full reset
    pub fn hard_reset(&mut self) {
        self.screen.reset();
        let cols = self.cols();
        self.status_screen = Screen::with_history(Dimensions::new(cols, 1), 0);
        self.active_display = ActiveDisplay::Main;
        self.status_type = StatusLineType::None;
        self.parser.reset();
        self.palette = ColorPalette::new();
        self.hyperlinks.clear();
        self.selection.clear();
        self.highlight = None;
        self.title.clear();
        self.icon_name.clear();
        self.title_stack.clear();
    }

    /// Resize the terminal; pixels are optional and refine the cell size
    pub fn resize_screen(&mut self, cols: usize, rows: usize, pixels: Option<(u32, u32)>) {
        let dims = Dimensions::new(cols, rows).sanitized();
        self.screen.resize(dims);
        self.status_screen.resize(Dimensions::new(dims.cols, 1));
        if let Some((w, h)) = pixels {
            self.set_window_pixel_size(w, h);
        }
        self.selection.clear();
    }

    /// Sweep hyperlink and image stores after big clears
    pub fn collect_garbage(&mut self) {
        let live_links = self.screen.live_hyperlinks();
        self.hyperlinks.prune(&live_links);
        let live_images = self.screen.live_images();
        self.screen.images_mut().retain(&live_images);
    }

    // --- selection ---

    pub fn begin_selection(&mut self, point: Point, mode: SelectionMode) {
        let mut start = point;
        let mut end = point;
        if mode == SelectionMode::Word {
            (start, end) = self.word_bounds(point);
        }
        self.selection.begin(start, mode);
        if mode == SelectionMode::Word {
            self.selection.extend(end);
        }
    }

    pub fn extend_selection(&mut self, point: Point) {
        self.selection.extend(point);
    }

    /// Finish the selection; a completed drag copies to the primary
    /// selection without disturbing mouse reporting
    pub fn complete_selection(&mut self) {
        self.selection.complete();
        if self.selection.is_complete() {
            let text = self.extract_selection_text();
            if !text.is_empty() {
                self.events.on_copy_to_clipboard("primary", text.as_bytes());
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Word boundaries around a point (double-click selection)
    fn word_bounds(&self, point: Point) -> (Point, Point) {
        let Some(line) = self.screen.absolute_line(point.row) else {
            return (point, point);
        };
        let cols = line.cols();
        let is_word = |col: usize| {
            let cell = line.cell(col);
            !cell.is_empty() && cell.display_char() != ' '
        };
        if point.col >= cols || !is_word(point.col) {
            return (point, point);
        }
        let mut start = point.col;
        while start > 0 && is_word(start - 1) {
            start -= 1;
        }
        let mut end = point.col;
        while end + 1 < cols && is_word(end + 1) {
            end += 1;
        }
        (
            Point::new(start, point.row),
            Point::new(end, point.row),
        )
    }

    /// Extract the selected text. Linear selections join wrapped lines
    /// without a newline; rectangular selections emit one line per row.
    pub fn extract_selection_text(&self) -> String {
        if !self.selection.is_active() {
            return String::new();
        }
        let (start, end) = self.selection.bounds();
        let mut out = String::new();

        for row in start.row..=end.row {
            let Some(line) = self.screen.absolute_line(row) else {
                continue;
            };
            let cols = line.cols();
            let mut line_text = String::new();
            for col in 0..cols {
                if !self.selection.contains(col, row) {
                    continue;
                }
                let cell = line.cell(col);
                if cell.is_continuation() {
                    continue;
                }
                if cell.content().is_empty() {
                    line_text.push(' ');
                } else {
                    line_text.push_str(cell.content());
                }
            }
            let trimmed = line_text.trim_end();
            out.push_str(trimmed);

            if row < end.row {
                let next_wrapped = self
                    .screen
                    .absolute_line(row + 1)
                    .map(|l| l.flags.wrapped)
                    .unwrap_or(false);
                let joins = self.selection.mode != SelectionMode::Rectangular && next_wrapped;
                if !joins {
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Highlight a range temporarily (the embedder owns the clear timer)
    pub fn set_highlight(&mut self, start: Point, end: Point) {
        self.highlight = Some((start, end));
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = None;
    }

    fn is_highlighted(&self, col: usize, row: isize) -> bool {
        let Some((start, end)) = self.highlight else {
            return false;
        };
        if row < start.row || row > end.row {
            return false;
        }
        if start.row == end.row {
            col >= start.col && col <= end.col
        } else if row == start.row {
            col >= start.col
        } else if row == end.row {
            col <= end.col
        } else {
            true
        }
    }

    // --- input generation ---

    pub fn encode_key_input(&self, key: Key, modifiers: Modifiers) -> Vec<u8> {
        let modes = self.screen.modes();
        input::encode_key(
            key,
            modifiers,
            modes.cursor_keys_application,
            modes.app_keypad,
        )
    }

    pub fn encode_mouse_input(
        &self,
        event: MouseEvent,
        cell: (u16, u16),
        pixel: (u16, u16),
        modifiers: Modifiers,
    ) -> Vec<u8> {
        let modes = self.screen.modes();
        let mut protocol = modes.mouse_protocol;
        if protocol == MouseProtocol::None && modes.passive_mouse {
            protocol = MouseProtocol::AnyEvent;
        }
        let encoding = if protocol == MouseProtocol::None {
            MouseEncoding::Default
        } else {
            modes.mouse_encoding
        };
        input::encode_mouse(event, cell, pixel, modifiers, protocol, encoding)
    }

    pub fn encode_paste_input(&self, text: &str) -> Vec<u8> {
        input::encode_paste(text, self.screen.modes().bracketed_paste)
    }

    pub fn encode_focus_input(&self, focused: bool) -> Option<Vec<u8>> {
        if self.screen.modes().focus_events {
            Some(input::encode_focus(focused))
        } else {
            None
        }
    }

    // --- render snapshot ---

    /// Rebuild the back frame of a render buffer from the current state
    pub fn refresh_render_buffer(&self, buffer: &RenderBuffer) {
        buffer.fetch_and_clear();
        {
            let mut frame = buffer.back();
            frame.size = Some(self.screen.dimensions());
            let selection_active = self.selection.is_active() || self.highlight.is_some();

            for (row, line) in self.screen.grid().iter().enumerate() {
                let plain_trivial = line.is_trivial() && !selection_active;
                if plain_trivial {
                    if let Some((text, attrs, _)) = line.trivial_view() {
                        if !text.is_empty() {
                            frame.lines.push(RenderLine {
                                row,
                                text: text.to_string(),
                                attrs,
                            });
                        }
                        continue;
                    }
                }
                for col in 0..line.cols() {
                    let cell = line.cell(col);
                    if cell.is_continuation() {
                        continue;
                    }
                    let selected = self.selection.contains(col, row as isize)
                        || self.is_highlighted(col, row as isize);
                    if cell.is_empty()
                        && cell.attrs == CellAttributes::default()
                        && cell.image.is_none()
                        && !selected
                    {
                        continue;
                    }
                    frame.cells.push(RenderCell {
                        row,
                        col,
                        content: cell.content().to_string(),
                        width: cell.width().max(1),
                        attrs: cell.attrs,
                        selected,
                        image: cell.image,
                    });
                }
            }

            let cursor = self.screen.cursor();
            frame.cursor = Some(RenderCursor {
                row: cursor.row,
                col: cursor.col,
                style: cursor.style,
                visible: cursor.visible && self.screen.modes().cursor_visible,
                width: 1,
            });
        }
        buffer.finish_refresh();
    }
}

// --- SGR ---

/// Apply an SGR parameter list to an attribute set. Handles both `;` and
/// `:` sub-parameter spellings for 4/38/48/58.
pub fn apply_sgr(params: &Params, attrs: &mut CellAttributes) {
    if params.is_empty() {
        attrs.reset();
        return;
    }

    let groups: Vec<(u16, &[u16])> = params.iter_groups().collect();
    let mut i = 0;
    while i < groups.len() {
        let (param, subs) = groups[i];
        match param {
            0 => attrs.reset(),
            1 => attrs.bold = true,
            2 => attrs.faint = true,
            3 => attrs.italic = true,
            4 => {
                attrs.underline = match subs.first() {
                    Some(&n) => {
                        UnderlineStyle::from_subparam(n).unwrap_or(UnderlineStyle::Single)
                    }
                    None => UnderlineStyle::Single,
                };
            }
            5 => attrs.blink = true,
            6 => attrs.rapid_blink = true,
            7 => attrs.inverse = true,
            8 => attrs.hidden = true,
            9 => attrs.strikethrough = true,
            21 => attrs.underline = UnderlineStyle::Double,
            22 => {
                attrs.bold = false;
                attrs.faint = false;
            }
            23 => attrs.italic = false,
            24 => attrs.underline = UnderlineStyle::None,
            25 => {
                attrs.blink = false;
                attrs.rapid_blink = false;
            }
            27 => attrs.inverse = false,
            28 => attrs.hidden = false,
            29 => attrs.strikethrough = false,
            30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
            38 => {
                if let Some((color, consumed)) = parse_extended_color(&groups, i) {
                    attrs.fg = color;
                    i += consumed;
                }
            }
            39 => attrs.fg = Color::Default,
            40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
            48 => {
                if let Some((color, consumed)) = parse_extended_color(&groups, i) {
                    attrs.bg = color;
                    i += consumed;
                }
            }
            49 => attrs.bg = Color::Default,
            51 => attrs.framed = true,
            53 => attrs.overline = true,
            54 => attrs.framed = false,
            55 => attrs.overline = false,
            58 => {
                if let Some((color, consumed)) = parse_extended_color(&groups, i) {
                    attrs.underline_color = color;
                    i += consumed;
                }
            }
            59 => attrs.underline_color = Color::Default,
            90..=97 => attrs.fg = Color::Indexed((param - 90 + 8) as u8),
            100..=107 => attrs.bg = Color::Indexed((param - 100 + 8) as u8),
            other => log::debug!("unhandled SGR parameter {}", other),
        }
        i += 1;
    }
}

/// Parse the color argument of SGR 38/48/58 starting at group `i`.
/// Returns the color and how many *extra* groups were consumed.
fn parse_extended_color(groups: &[(u16, &[u16])], i: usize) -> Option<(Color, usize)> {
    let (_, subs) = groups[i];
    if !subs.is_empty() {
        // Colon form: 38:5:n / 38:2:r:g:b / 38:2::r:g:b
        return match subs[0] {
            5 if subs.len() >= 2 => Some((Color::Indexed(subs[1] as u8), 0)),
            2 if subs.len() >= 4 => {
                let rgb = &subs[subs.len() - 3..];
                Some((
                    Color::Rgb {
                        r: rgb[0] as u8,
                        g: rgb[1] as u8,
                        b: rgb[2] as u8,
                    },
                    0,
                ))
            }
            _ => None,
        };
    }
    // Semicolon form: 38;5;n / 38;2;r;g;b
    match groups.get(i + 1).map(|g| g.0) {
        Some(5) => {
            let index = groups.get(i + 2)?.0;
            Some((Color::Indexed(index as u8), 2))
        }
        Some(2) => {
            let r = groups.get(i + 2)?.0;
            let g = groups.get(i + 3)?.0;
            let b = groups.get(i + 4)?.0;
            Some((
                Color::Rgb {
                    r: r as u8,
                    g: g as u8,
                    b: b as u8,
                },
                4,
            ))
        }
        _ => None,
    }
}

/// Reconstruct an SGR string from attributes (DECRQSS answer)
fn sgr_string(attrs: &CellAttributes) -> String {
    let mut parts = vec!["0".to_string()];
    if attrs.bold {
        parts.push("1".into());
    }
    if attrs.faint {
        parts.push("2".into());
    }
    if attrs.italic {
        parts.push("3".into());
    }
    match attrs.underline {
        UnderlineStyle::None => {}
        UnderlineStyle::Single => parts.push("4".into()),
        UnderlineStyle::Double => parts.push("4:2".into()),
        UnderlineStyle::Curly => parts.push("4:3".into()),
        UnderlineStyle::Dotted => parts.push("4:4".into()),
        UnderlineStyle::Dashed => parts.push("4:5".into()),
    }
    if attrs.blink {
        parts.push("5".into());
    }
    if attrs.inverse {
        parts.push("7".into());
    }
    if attrs.hidden {
        parts.push("8".into());
    }
    if attrs.strikethrough {
        parts.push("9".into());
    }
    match attrs.fg {
        Color::Default => {}
        Color::Indexed(i) if i < 8 => parts.push(format!("{}", 30 + i)),
        Color::Indexed(i) if i < 16 => parts.push(format!("{}", 90 + i - 8)),
        Color::Indexed(i) => parts.push(format!("38;5;{}", i)),
        Color::Rgb { r, g, b } => parts.push(format!("38;2;{};{};{}", r, g, b)),
    }
    match attrs.bg {
        Color::Default => {}
        Color::Indexed(i) if i < 8 => parts.push(format!("{}", 40 + i)),
        Color::Indexed(i) if i < 16 => parts.push(format!("{}", 100 + i - 8)),
        Color::Indexed(i) => parts.push(format!("48;5;{}", i)),
        Color::Rgb { r, g, b } => parts.push(format!("48;2;{};{};{}", r, g, b)),
    }
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term() -> Terminal {
        Terminal::new(Dimensions::new(20, 5))
    }

    #[test]
    fn test_sgr_reset_keeps_protection() {
        let mut attrs = CellAttributes::default();
        attrs.protected = true;
        apply_sgr(&Params::parse(b"0"), &mut attrs);
        assert!(attrs.protected);
    }

    #[test]
    fn test_sgr_extended_colors_both_forms() {
        let mut semi = CellAttributes::default();
        apply_sgr(&Params::parse(b"38;2;1;2;3"), &mut semi);
        let mut colon = CellAttributes::default();
        apply_sgr(&Params::parse(b"38:2::1:2:3"), &mut colon);
        assert_eq!(semi.fg, colon.fg);
        assert_eq!(semi.fg, Color::Rgb { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn test_sgr_consumes_extended_color_groups() {
        // The bold after the color must still apply
        let mut attrs = CellAttributes::default();
        apply_sgr(&Params::parse(b"38;5;100;1"), &mut attrs);
        assert_eq!(attrs.fg, Color::Indexed(100));
        assert!(attrs.bold);
    }

    #[test]
    fn test_malformed_sgr_subparams_skipped() {
        let mut attrs = CellAttributes::default();
        apply_sgr(&Params::parse(b"38:9:9;1"), &mut attrs);
        assert_eq!(attrs.fg, Color::Default);
        assert!(attrs.bold);
    }

    #[test]
    fn test_trace_gate_holds_sequences() {
        let mut term = term();
        term.set_execution_mode(ExecutionMode::Waiting);
        term.process(b"\x1b[1;5HX");
        // CUP is held, and the print behind it queues too
        assert_eq!(term.screen().cursor().col, 0);
        assert!(term.has_pending_actions());

        term.trace_step(1);
        assert_eq!(term.screen().line(0).cell(4).display_char(), 'X');
        assert!(!term.has_pending_actions());

        term.trace_leave();
        term.process(b"\x1b[1;1H");
        assert_eq!(term.screen().cursor().col, 0);
    }

    #[test]
    fn test_status_display_routing() {
        let mut term = term();
        term.process(b"main");
        term.process(b"\x1b[2$~\x1b[1$}");
        term.process(b"status!");
        term.process(b"\x1b[0$}");
        term.process(b"-more");

        assert_eq!(term.status_screen().line(0).text(), "status!");
        assert_eq!(term.screen().line(0).text(), "main-more");
        assert_eq!(term.status_line_type(), StatusLineType::HostWritable);
    }

    #[test]
    fn test_status_line_requires_host_writable() {
        let mut term = term();
        term.process(b"\x1b[1$}");
        term.process(b"x");
        assert!(term.status_screen().line(0).is_empty());
        assert_eq!(term.screen().line(0).text(), "x");
    }

    #[test]
    fn test_selection_joins_wrapped_lines() {
        let mut term = Terminal::new(Dimensions::new(4, 3));
        term.process(b"abcdefgh");
        term.begin_selection(Point::new(0, 0), SelectionMode::Linear);
        term.extend_selection(Point::new(3, 1));
        assert_eq!(term.extract_selection_text(), "abcdefgh");
    }

    #[test]
    fn test_selection_rectangular_lines() {
        let mut term = term();
        term.process(b"one\r\ntwo\r\nsix");
        term.begin_selection(Point::new(0, 0), SelectionMode::Rectangular);
        term.extend_selection(Point::new(2, 2));
        assert_eq!(term.extract_selection_text(), "one\ntwo\nsix");
    }

    #[test]
    fn test_word_selection_expands() {
        let mut term = term();
        term.process(b"hello world");
        term.begin_selection(Point::new(7, 0), SelectionMode::Word);
        assert_eq!(term.extract_selection_text(), "world");
    }

    #[test]
    fn test_collect_garbage_prunes_hyperlinks() {
        let mut term = term();
        term.process(b"\x1b]8;;https://e/\x1b\\A\x1b]8;;\x1b\\");
        assert_eq!(term.hyperlinks().len(), 1);
        term.process(b"\x1b[2J");
        term.collect_garbage();
        assert!(term.hyperlinks().is_empty());
    }

    #[test]
    fn test_osc4_query_and_set() {
        let mut term = term();
        term.process(b"\x1b]4;1;#102030\x07");
        assert_eq!(term.palette().indexed(1), (16, 32, 48));
        term.process(b"\x1b]4;1;?\x07");
        let reply = String::from_utf8(term.take_replies()).unwrap();
        assert_eq!(reply, "\x1b]4;1;rgb:1010/2020/3030\x1b\\");
    }

    #[test]
    fn test_push_pop_colors() {
        let mut term = term();
        term.process(b"\x1b]4;0;#ffffff\x07");
        term.process(b"\x1b[#P");
        term.process(b"\x1b]4;0;#000000\x07");
        term.process(b"\x1b[#Q");
        assert_eq!(term.palette().indexed(0), (255, 255, 255));
    }

    #[test]
    fn test_deccolm_resizes_and_clears() {
        let mut term = term();
        term.process(b"stale\x1b[?3h");
        assert_eq!(term.cols(), 132);
        assert!(term.screen().line(0).is_empty());
        term.process(b"\x1b[?3l");
        assert_eq!(term.cols(), 80);
    }

    #[test]
    fn test_hard_reset_clears_everything() {
        let mut term = term();
        term.process(b"\x1b]2;title\x07text\x1b[1;31m\x1b[?25l");
        term.process(b"\x1bc");
        assert!(term.title().is_empty());
        assert!(term.screen().line(0).is_empty());
        assert_eq!(term.screen().cursor().attrs, CellAttributes::default());
        assert!(term.screen().modes().cursor_visible);
    }

    #[test]
    fn test_render_frame_trivial_lines() {
        let term = {
            let mut t = term();
            t.process(b"plain\r\n\x1b[1mbold");
            t
        };
        let buffer = RenderBuffer::new();
        buffer.touch();
        term.refresh_render_buffer(&buffer);
        let frame = buffer.swap_and_read();
        // "plain" stays a whole-line run; "bold" has non-default attrs but
        // is still a uniform trivial line
        assert!(frame.lines.iter().any(|l| l.text == "plain"));
        assert!(frame
            .lines
            .iter()
            .any(|l| l.text == "bold" && l.attrs.bold));
        assert!(frame.cursor.is_some());
    }

    #[test]
    fn test_render_frame_cells_when_selected() {
        let mut term = term();
        term.process(b"pick");
        term.begin_selection(Point::new(0, 0), SelectionMode::Linear);
        term.extend_selection(Point::new(3, 0));
        let buffer = RenderBuffer::new();
        term.refresh_render_buffer(&buffer);
        let frame = buffer.swap_and_read();
        assert!(frame.lines.is_empty());
        assert_eq!(frame.cells.iter().filter(|c| c.selected).count(), 4);
    }
}

fn hex_decode(data: &str) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(data.len() / 2);
    let bytes = data.as_bytes();
    for pair in bytes.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    String::from_utf8(out).ok()
}

fn hex_encode(data: &str) -> String {
    data.bytes().map(|b| format!("{:02X}", b)).collect()
}
