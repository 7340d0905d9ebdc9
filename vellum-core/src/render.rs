//! Render buffer
//!
//! The exchange point between the terminal update thread and the renderer:
//! two frames, an atomic back-buffer index only the producer changes, and a
//! small state machine that keeps repaints coalesced without tearing.
//!
//! Producer cycle: `fetch_and_clear()` -> build into `back()` ->
//! `finish_refresh()`. Consumer cycle: `touch()` when content changed,
//! `swap_and_read()` to obtain the newest finished frame.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::cell::{CellAttributes, ImageFragment};
use crate::cursor::CursorStyle;
use crate::Dimensions;

/// One renderable cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCell {
    pub row: usize,
    pub col: usize,
    /// Grapheme to draw; empty means background-only
    pub content: String,
    pub width: u8,
    pub attrs: CellAttributes,
    pub selected: bool,
    #[serde(skip)]
    pub image: Option<ImageFragment>,
}

/// A full line of uniform text the renderer may draw without inspecting
/// individual cells (the trivial-line shortcut surviving to the very end)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLine {
    pub row: usize,
    pub text: String,
    pub attrs: CellAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCursor {
    pub row: usize,
    pub col: usize,
    pub style: CursorStyle,
    pub visible: bool,
    pub width: u8,
}

/// One complete snapshot of the visible page
#[derive(Debug, Clone, Default)]
pub struct RenderFrame {
    pub size: Option<Dimensions>,
    pub cells: Vec<RenderCell>,
    pub lines: Vec<RenderLine>,
    pub cursor: Option<RenderCursor>,
    pub frame_id: u64,
}

impl RenderFrame {
    pub fn clear(&mut self) {
        self.cells.clear();
        self.lines.clear();
        self.cursor = None;
    }
}

/// Refresh state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBufferState {
    /// Nothing changed since the last swap
    WaitingForRefresh,
    /// Content changed; the producer should rebuild and swap
    RefreshBuffersAndTrySwap,
    /// Back buffer rebuilt and ready for the consumer to swap in
    TrySwapBuffers,
    /// Producer is painting right now
    CleanPainting,
}

const STATE_WAITING: u8 = 0;
const STATE_REFRESH: u8 = 1;
const STATE_TRY_SWAP: u8 = 2;
const STATE_PAINTING: u8 = 3;

fn state_from(raw: u8) -> RenderBufferState {
    match raw {
        STATE_REFRESH => RenderBufferState::RefreshBuffersAndTrySwap,
        STATE_TRY_SWAP => RenderBufferState::TrySwapBuffers,
        STATE_PAINTING => RenderBufferState::CleanPainting,
        _ => RenderBufferState::WaitingForRefresh,
    }
}

/// Double buffer of render frames
#[derive(Debug)]
pub struct RenderBuffer {
    buffers: [Mutex<RenderFrame>; 2],
    /// Index of the buffer the producer writes; flipped only by the
    /// producer side of the protocol
    back_index: AtomicUsize,
    state: AtomicU8,
    frame_counter: AtomicU64,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self {
            buffers: [
                Mutex::new(RenderFrame::default()),
                Mutex::new(RenderFrame::default()),
            ],
            back_index: AtomicUsize::new(0),
            state: AtomicU8::new(STATE_WAITING),
            frame_counter: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> RenderBufferState {
        state_from(self.state.load(Ordering::Acquire))
    }

    /// Mark the content stale. Safe to call while a paint is in flight; the
    /// producer's `finish_refresh` will notice and schedule another pass.
    pub fn touch(&self) {
        self.state.store(STATE_REFRESH, Ordering::Release);
    }

    /// Producer: begin a refresh cycle, returning the prior state. Only a
    /// prior `RefreshBuffersAndTrySwap` requires rebuilding.
    pub fn fetch_and_clear(&self) -> RenderBufferState {
        state_from(self.state.swap(STATE_PAINTING, Ordering::AcqRel))
    }

    /// Producer: lock the back frame for rebuilding. The returned frame is
    /// pre-cleared and stamped with a fresh frame id.
    pub fn back(&self) -> MutexGuard<'_, RenderFrame> {
        let index = self.back_index.load(Ordering::Acquire);
        let mut frame = lock_ignoring_poison(&self.buffers[index]);
        frame.clear();
        frame.frame_id = self.frame_counter.fetch_add(1, Ordering::AcqRel) + 1;
        frame
    }

    /// Producer: finish the paint. Returns true iff no further paint is
    /// needed (no `touch()` arrived while painting).
    pub fn finish_refresh(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_PAINTING,
                STATE_TRY_SWAP,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Consumer: swap in the newest finished frame (if one is pending) and
    /// lock it for reading. The lock is held for the whole inspection.
    pub fn swap_and_read(&self) -> MutexGuard<'_, RenderFrame> {
        if self
            .state
            .compare_exchange(
                STATE_TRY_SWAP,
                STATE_WAITING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            let back = self.back_index.load(Ordering::Acquire);
            self.back_index.store(1 - back, Ordering::Release);
        }
        let front = 1 - self.back_index.load(Ordering::Acquire);
        lock_ignoring_poison(&self.buffers[front])
    }

    /// Newest completed frame id
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.load(Ordering::Acquire)
    }
}

impl Default for RenderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
