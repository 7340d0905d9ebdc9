//! vellum-parser - VT/ANSI escape sequence parser
//!
//! A table-free implementation of the VT500-series parser model
//! (https://vt100.net/emu/dec_ansi_parser) tuned for streaming input:
//! - C0/C1 controls, ESC, CSI, OSC, DCS, APC, PM, SOS
//! - CSI parameters with `:` sub-parameters (SGR underline styles, colors)
//! - incremental UTF-8 decoding across chunk boundaries
//! - a bulk fast path for runs of printable ASCII
//! - a Sixel (DCS q) pixel decoder
//!
//! The parser is pure: it turns bytes into [`Action`]s and never touches
//! screen state. Dispatching actions is the terminal's job.

mod action;
mod params;
mod parser;
pub mod sixel;
mod utf8;

pub use action::{Action, CsiSequence, DcsSequence, EscSequence};
pub use params::Params;
pub use parser::{Parser, ParserState};
pub use utf8::{Utf8Decoder, Utf8Result};
