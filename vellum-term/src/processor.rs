//! PTY session: the IO thread
//!
//! One thread owns the PTY and loops: drain queued input/resize commands,
//! read with a refresh-derived timeout, feed the parser under the terminal
//! mutex, flush replies, and rebuild the render back buffer. Everything
//! another thread wants from the PTY goes through the command queue plus a
//! wakeup so the reader never blocks it for long.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use vellum_core::{Dimensions, RenderBuffer};
use vellum_pty::{Child, Error as PtyError, Pty, WakeupHandle, WindowSize};

use crate::event::TerminalEvents;
use crate::terminal::Terminal;

/// A child exiting faster than this is probably a configuration problem
const EARLY_EXIT_THRESHOLD: Duration = Duration::from_secs(6);

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub size: WindowSize,
    /// Program to run; `None` spawns the user's login shell
    pub program: Option<String>,
    pub args: Vec<String>,
    /// Repaint ticks per second; also bounds the PTY read timeout
    pub refresh_rate: u32,
    pub max_history_lines: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            size: WindowSize::default(),
            program: None,
            args: Vec::new(),
            refresh_rate: 60,
            max_history_lines: 10000,
        }
    }
}

enum Command {
    Input(Vec<u8>),
    Resize(WindowSize),
}

/// A running terminal session
pub struct Session {
    terminal: Arc<Mutex<Terminal>>,
    render_buffer: Arc<RenderBuffer>,
    commands: Sender<Command>,
    wakeup: WakeupHandle,
    terminating: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawn the child and start the IO thread
    pub fn start(
        config: SessionConfig,
        events: Arc<dyn TerminalEvents>,
    ) -> Result<Self, PtyError> {
        let mut pty = Pty::open(config.size)?;
        let child = match &config.program {
            Some(program) => Child::spawn(program.clone(), config.args.clone(), &[], &pty)?,
            None => Child::spawn_shell(&pty)?,
        };

        let dims = Dimensions::new(config.size.cols as usize, config.size.rows as usize);
        let terminal = Arc::new(Mutex::new(Terminal::with_events(dims, events.clone())));
        let render_buffer = Arc::new(RenderBuffer::new());
        let wakeup = pty.wakeup_handle()?;
        let terminating = Arc::new(AtomicBool::new(false));
        let (commands, command_rx) = mpsc::channel();

        let io_thread = {
            let terminal = terminal.clone();
            let render_buffer = render_buffer.clone();
            let terminating = terminating.clone();
            let refresh_rate = config.refresh_rate.max(1);
            std::thread::Builder::new()
                .name("vellum-io".to_string())
                .spawn(move || {
                    io_loop(
                        &mut pty,
                        &child,
                        &terminal,
                        &render_buffer,
                        &command_rx,
                        &terminating,
                        events,
                        refresh_rate,
                    );
                })
                .map_err(PtyError::Io)?
        };

        Ok(Self {
            terminal,
            render_buffer,
            commands,
            wakeup,
            terminating,
            io_thread: Some(io_thread),
        })
    }

    pub fn terminal(&self) -> &Arc<Mutex<Terminal>> {
        &self.terminal
    }

    /// Lock the terminal for inspection
    pub fn lock_terminal(&self) -> MutexGuard<'_, Terminal> {
        lock_ignoring_poison(&self.terminal)
    }

    pub fn render_buffer(&self) -> &Arc<RenderBuffer> {
        &self.render_buffer
    }

    /// Queue bytes for the child (key presses, paste, mouse reports)
    pub fn send_input(&self, bytes: Vec<u8>) {
        if self.commands.send(Command::Input(bytes)).is_ok() {
            self.wakeup.wakeup();
        }
    }

    /// Queue a resize; the IO thread updates both kernel and grid
    pub fn resize(&self, size: WindowSize) {
        if self.commands.send(Command::Resize(size)).is_ok() {
            self.wakeup.wakeup();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.terminating.load(Ordering::Acquire)
            && self.io_thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the IO thread and wait for it
    pub fn close(&mut self) {
        self.terminating.store(true, Ordering::Release);
        self.wakeup.wakeup();
        if let Some(thread) = self.io_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[allow(clippy::too_many_arguments)]
fn io_loop(
    pty: &mut Pty,
    child: &Child,
    terminal: &Arc<Mutex<Terminal>>,
    render_buffer: &Arc<RenderBuffer>,
    commands: &Receiver<Command>,
    terminating: &Arc<AtomicBool>,
    events: Arc<dyn TerminalEvents>,
    refresh_rate: u32,
) {
    let started = Instant::now();
    let timeout = Duration::from_millis((1000 / refresh_rate).max(1) as u64);
    let mut buf = vec![0u8; 65536];

    loop {
        if terminating.load(Ordering::Acquire) {
            break;
        }

        loop {
            match commands.try_recv() {
                Ok(Command::Input(bytes)) => {
                    if let Err(e) = pty.write(&bytes) {
                        log::debug!("input write failed: {}", e);
                    }
                }
                Ok(Command::Resize(size)) => {
                    if let Err(e) = child.resize(pty, size) {
                        log::debug!("resize failed: {}", e);
                    }
                    let mut term = lock_ignoring_poison(terminal);
                    term.resize_screen(size.cols as usize, size.rows as usize, None);
                    render_buffer.touch();
                    term.refresh_render_buffer(render_buffer);
                    drop(term);
                    events.on_render_buffer_updated();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        match pty.read(&mut buf, Some(timeout)) {
            Ok(Some(event)) => {
                // Fast-pipe data takes the same path through the parser;
                // the flag only matters for diagnostics.
                let mut term = lock_ignoring_poison(terminal);
                term.process(&buf[..event.len]);
                let replies = term.take_replies();
                render_buffer.touch();
                if !term.screen().modes().synchronized_output {
                    term.refresh_render_buffer(render_buffer);
                }
                drop(term);
                if !replies.is_empty() {
                    if let Err(e) = pty.write(&replies) {
                        log::debug!("reply write failed: {}", e);
                    }
                }
                events.on_render_buffer_updated();
            }
            Ok(None) => {
                // Timeout or wakeup; loop around for commands/termination
            }
            Err(e) => {
                log::debug!("PTY stream ended: {}", e);
                break;
            }
        }
    }

    terminating.store(true, Ordering::Release);
    let exited_early = started.elapsed() < EARLY_EXIT_THRESHOLD;
    if exited_early && !child.is_running() {
        events.on_set_window_title("Process terminated too quickly");
    }
    let _ = child.try_wait();
    events.on_closed();
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullEvents;

    #[test]
    fn test_session_echo() {
        let config = SessionConfig {
            program: Some("/bin/echo".to_string()),
            args: vec!["session_ok".to_string()],
            ..Default::default()
        };
        // PTYs may be unavailable in minimal build sandboxes
        let Ok(mut session) = Session::start(config, Arc::new(NullEvents)) else {
            return;
        };

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut seen = false;
        while Instant::now() < deadline {
            {
                let term = session.lock_terminal();
                if term.snapshot().screen_text().contains("session_ok") {
                    seen = true;
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        session.close();
        assert!(seen, "child output never reached the grid");
    }

    #[test]
    fn test_session_input_roundtrip() {
        let config = SessionConfig {
            program: Some("/bin/cat".to_string()),
            ..Default::default()
        };
        let Ok(mut session) = Session::start(config, Arc::new(NullEvents)) else {
            return;
        };

        session.send_input(b"marker_42\n".to_vec());

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut seen = false;
        while Instant::now() < deadline {
            {
                let term = session.lock_terminal();
                if term.snapshot().screen_text().contains("marker_42") {
                    seen = true;
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        session.close();
        assert!(seen, "echoed input never reached the grid");
    }

    #[test]
    fn test_render_buffer_updates() {
        let config = SessionConfig {
            program: Some("/bin/echo".to_string()),
            args: vec!["frame".to_string()],
            ..Default::default()
        };
        let Ok(mut session) = Session::start(config, Arc::new(NullEvents)) else {
            return;
        };

        let buffer = session.render_buffer().clone();
        let deadline = Instant::now() + Duration::from_secs(3);
        let mut seen = false;
        while Instant::now() < deadline {
            {
                let frame = buffer.swap_and_read();
                if frame
                    .lines
                    .iter()
                    .any(|line| line.text.contains("frame"))
                {
                    seen = true;
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        session.close();
        assert!(seen, "render frame never carried the output");
    }
}
