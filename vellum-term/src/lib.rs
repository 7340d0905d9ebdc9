//! vellum-term - terminal orchestration
//!
//! Ties the parser, screen model and PTY together:
//! - [`Sequence`]/[`FunctionId`]: the accumulated control function and the
//!   static dispatch table that identifies it
//! - [`Terminal`]: the root object applying sequences to screens and
//!   queueing replies
//! - [`Session`]: the IO thread driving a spawned child through the PTY
//! - [`input`]: key/mouse/paste byte generation
//! - [`TerminalEvents`]: the embedder hook trait

pub mod event;
pub mod input;
pub mod processor;
pub mod sequence;
pub mod terminal;

pub use event::{NullEvents, TerminalEvents};
pub use processor::{Session, SessionConfig};
pub use sequence::{Category, DispatchResult, FunctionDef, FunctionId, Sequence, FUNCTIONS};
pub use terminal::{ActiveDisplay, ExecutionMode, StatusLineType, Terminal};
