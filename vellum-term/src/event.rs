//! Embedder event hooks
//!
//! The terminal core never talks to a windowing system, clipboard or audio
//! device directly; it calls these hooks and the embedder decides. All
//! methods default to no-ops so embedders implement only what they need.

/// Callbacks from the terminal into the embedding application
pub trait TerminalEvents: Send + Sync {
    /// BEL received
    fn on_bell(&self) {}

    /// OSC 0/2 changed the window title
    fn on_set_window_title(&self, _title: &str) {}

    /// Selection completed or OSC 52 wrote the clipboard.
    /// `target` is "clipboard" or "primary".
    fn on_copy_to_clipboard(&self, _target: &str, _data: &[u8]) {}

    /// OSC 777;notify
    fn on_notify(&self, _title: &str, _body: &str) {}

    /// OSC 7 changed the working directory
    fn on_set_working_directory(&self, _dir: &str) {}

    /// The page scrolled (history grew by n lines)
    fn on_scrollback(&self, _lines: usize) {}

    /// A new render frame is pending
    fn on_render_buffer_updated(&self) {}

    /// The PTY stream ended
    fn on_closed(&self) {}
}

/// Default sink that ignores every event
pub struct NullEvents;

impl TerminalEvents for NullEvents {}
