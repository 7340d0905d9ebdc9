//! vellum-pty - POSIX pseudoterminal management
//!
//! Creates the master/slave pair, spawns the child session, and provides
//! the multiplexed read the terminal's IO loop is built on:
//! - `openpty` + `fork`, with `setsid`/`TIOCSCTTY`/`dup2` in the child
//! - non-blocking master with a `poll(2)` selector over the master, an
//!   internal wakeup pipe, and an optional stdout fast pipe
//! - window size plumbing (TIOCSWINSZ/TIOCGWINSZ + SIGWINCH)

mod child;
mod error;
mod pty;
mod size;

pub use child::Child;
pub use error::{Error, Result};
pub use pty::{Pty, ReadEvent, WakeupHandle};
pub use size::WindowSize;
