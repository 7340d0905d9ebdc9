//! PTY master management
//!
//! The master side is non-blocking; [`Pty::read`] multiplexes it with an
//! internal wakeup pipe (so another thread can interrupt a blocked reader)
//! and an optional "fast pipe" the child may use for bulk output. Writes
//! fall back to a temporarily-blocking write when the kernel buffer fills.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags};
use nix::pty::openpty;
use nix::unistd::pipe;

use crate::error::{Error, Result};
use crate::size::WindowSize;

/// Result of a successful [`Pty::read`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadEvent {
    /// Bytes placed into the caller's buffer
    pub len: usize,
    /// Data arrived through the fast pipe rather than the master
    pub from_fast_pipe: bool,
}

/// A pseudoterminal master with its selector plumbing
pub struct Pty {
    master: OwnedFd,
    /// Kept open so ioctls on the master keep working before the child
    /// opens its own copy
    slave: OwnedFd,
    /// Dup of the master used for stream I/O
    file: File,
    wakeup_rx: File,
    wakeup_tx: File,
    fast_pipe: Option<File>,
    closed: AtomicBool,
}

impl Pty {
    /// Open a master/slave pair at the given size
    pub fn open(size: WindowSize) -> Result<Self> {
        let pair = openpty(None, None)?;
        let file = File::from(pair.master.try_clone().map_err(Error::Io)?);
        let (wakeup_rx, wakeup_tx) = pipe()?;

        let pty = Self {
            master: pair.master,
            slave: pair.slave,
            file,
            wakeup_rx: unsafe { File::from_raw_fd(wakeup_rx) },
            wakeup_tx: unsafe { File::from_raw_fd(wakeup_tx) },
            fast_pipe: None,
            closed: AtomicBool::new(false),
        };
        pty.set_window_size(size)?;
        pty.set_nonblocking(true)?;
        Ok(pty)
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn slave_fd(&self) -> RawFd {
        self.slave.as_raw_fd()
    }

    /// Create the auxiliary bulk-output pipe; returns the write end for the
    /// child. Bytes read from it are reported with `from_fast_pipe = true`
    /// but are otherwise handled exactly like master output.
    pub fn open_fast_pipe(&mut self) -> Result<OwnedFd> {
        let (rx, tx) = pipe()?;
        self.fast_pipe = Some(unsafe { File::from_raw_fd(rx) });
        Ok(unsafe { OwnedFd::from_raw_fd(tx) })
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        let fd = self.master.as_raw_fd();
        let flags = fcntl(fd, FcntlArg::F_GETFL)?;
        let flags = OFlag::from_bits_truncate(flags);
        let new_flags = if nonblocking {
            flags | OFlag::O_NONBLOCK
        } else {
            flags & !OFlag::O_NONBLOCK
        };
        fcntl(fd, FcntlArg::F_SETFL(new_flags))?;
        Ok(())
    }

    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        let ws = size.to_winsize();
        let result =
            unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if result == -1 {
            Err(Error::WindowSize(io::Error::last_os_error().to_string()))
        } else {
            Ok(())
        }
    }

    pub fn window_size(&self) -> Result<WindowSize> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let result =
            unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCGWINSZ, &mut ws) };
        if result == -1 {
            Err(Error::WindowSize(io::Error::last_os_error().to_string()))
        } else {
            Ok(WindowSize::from(ws))
        }
    }

    /// Read with a timeout. `Ok(None)` means timeout, wakeup interrupt or
    /// fast-pipe EOF; `Err(Error::Closed)` means the stream ended.
    pub fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Option<ReadEvent>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let timeout_ms: i32 = timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        let (master_ready, master_hup, wakeup_ready, fast_ready) = {
            let mut fds = Vec::with_capacity(3);
            fds.push(PollFd::new(&self.file, PollFlags::POLLIN));
            fds.push(PollFd::new(&self.wakeup_rx, PollFlags::POLLIN));
            if let Some(fast) = &self.fast_pipe {
                fds.push(PollFd::new(fast, PollFlags::POLLIN));
            }

            match poll(&mut fds, timeout_ms) {
                Ok(0) => return Ok(None),
                Ok(_) => {}
                Err(Errno::EINTR) => return Ok(None),
                Err(e) => {
                    self.closed.store(true, Ordering::Release);
                    return Err(e.into());
                }
            }

            let has = |fd: &PollFd<'_>, flag: PollFlags| {
                fd.revents().is_some_and(|r| r.contains(flag))
            };
            (
                has(&fds[0], PollFlags::POLLIN),
                has(&fds[0], PollFlags::POLLHUP) || has(&fds[0], PollFlags::POLLERR),
                has(&fds[1], PollFlags::POLLIN),
                fds.get(2)
                    .map(|fd| has(fd, PollFlags::POLLIN) || has(fd, PollFlags::POLLHUP))
                    .unwrap_or(false),
            )
        };

        if wakeup_ready {
            let mut drain = [0u8; 64];
            let _ = (&self.wakeup_rx).read(&mut drain);
            return Ok(None);
        }

        if fast_ready {
            if let Some(fast) = &self.fast_pipe {
                match (&*fast).read(buf) {
                    Ok(0) => {
                        self.fast_pipe = None;
                        return Ok(None);
                    }
                    Ok(len) => {
                        return Ok(Some(ReadEvent {
                            len,
                            from_fast_pipe: true,
                        }))
                    }
                    Err(e) if would_block(&e) => {}
                    Err(e) => {
                        log::debug!("fast pipe read error: {}", e);
                        self.fast_pipe = None;
                        return Ok(None);
                    }
                }
            }
        }

        if master_ready {
            match (&self.file).read(buf) {
                Ok(0) => {
                    self.closed.store(true, Ordering::Release);
                    return Err(Error::Closed);
                }
                Ok(len) => {
                    return Ok(Some(ReadEvent {
                        len,
                        from_fast_pipe: false,
                    }))
                }
                Err(e) if would_block(&e) => return Ok(None),
                Err(e) => {
                    self.closed.store(true, Ordering::Release);
                    return Err(e.into());
                }
            }
        }

        if master_hup {
            self.closed.store(true, Ordering::Release);
            return Err(Error::Closed);
        }

        Ok(None)
    }

    /// Write to the child. A partial non-blocking write falls back to a
    /// blocking write of the remainder so replies are never dropped.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let mut written = 0;
        while written < data.len() {
            match (&self.file).write(&data[written..]) {
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.set_nonblocking(false)?;
                    let result = (&self.file).write_all(&data[written..]);
                    let restore = self.set_nonblocking(true);
                    result?;
                    restore?;
                    written = data.len();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.closed.store(true, Ordering::Release);
                    return Err(e.into());
                }
            }
        }
        Ok(written)
    }

    /// Interrupt a reader blocked in [`Pty::read`]
    pub fn wakeup(&self) {
        let _ = (&self.wakeup_tx).write(&[0u8]);
    }

    /// A clonable handle other threads can use to interrupt the reader
    /// without sharing the whole Pty
    pub fn wakeup_handle(&self) -> Result<WakeupHandle> {
        Ok(WakeupHandle {
            tx: self.wakeup_tx.try_clone().map_err(Error::Io)?,
        })
    }

    /// Flag the stream closed and unblock the reader
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wakeup();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Cross-thread wakeup for a blocked [`Pty::read`]
pub struct WakeupHandle {
    tx: File,
}

impl WakeupHandle {
    pub fn wakeup(&self) {
        let _ = (&self.tx).write(&[0u8]);
    }
}

fn would_block(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Apply a sane line discipline to the slave side (raw-ish input, output
/// post-processing on so the child sees a normal tty)
pub fn configure_slave(fd: RawFd) -> Result<()> {
    use nix::sys::termios::{self, SetArg};
    use std::os::fd::BorrowedFd;

    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut termios = termios::tcgetattr(borrowed)?;
    termios.input_flags &= !(termios::InputFlags::IGNBRK
        | termios::InputFlags::BRKINT
        | termios::InputFlags::PARMRK
        | termios::InputFlags::ISTRIP
        | termios::InputFlags::INLCR
        | termios::InputFlags::IGNCR
        | termios::InputFlags::IXON);
    termios.output_flags |= termios::OutputFlags::OPOST | termios::OutputFlags::ONLCR;
    termios.control_flags &= !(termios::ControlFlags::CSIZE | termios::ControlFlags::PARENB);
    termios.control_flags |= termios::ControlFlags::CS8;
    termios.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 1;
    termios.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = 0;
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    termios::tcsetattr(borrowed, SetArg::TCSANOW, &termios)?;
    Ok(())
}
