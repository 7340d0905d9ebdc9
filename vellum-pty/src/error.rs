//! Error types for PTY operations

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PTY creation failed
    #[error("failed to create PTY: {0}")]
    PtyCreation(String),

    /// Failed to spawn the child process
    #[error("failed to spawn child: {0}")]
    SpawnFailed(String),

    /// Failed to set the window size
    #[error("failed to set window size: {0}")]
    WindowSize(String),

    /// The stream is closed
    #[error("PTY is closed")]
    Closed,

    /// System error
    #[error("system error: {0}")]
    Nix(#[from] nix::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
