//! Child process spawning
//!
//! Forks, puts the child into its own session with the PTY slave as its
//! controlling terminal, and execs the program with stdio on the slave.

use std::ffi::{CString, OsStr};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;

use nix::libc;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{dup2, execvp, fork, setsid, ForkResult, Pid};

use crate::error::{Error, Result};
use crate::pty::{configure_slave, Pty};

/// A child process attached to a PTY
pub struct Child {
    pid: Pid,
}

impl Child {
    /// Spawn a program onto the PTY's slave side.
    ///
    /// `env` entries are added on top of the inherited environment; `TERM`
    /// and `COLORTERM` are always set so the child sees a capable terminal.
    pub fn spawn<S, I, A>(program: S, args: I, env: &[(String, String)], pty: &Pty) -> Result<Self>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let program_cstr = CString::new(program.as_ref().as_bytes())
            .map_err(|e| Error::SpawnFailed(e.to_string()))?;
        let mut argv: Vec<CString> = vec![program_cstr.clone()];
        for arg in args {
            argv.push(
                CString::new(arg.as_ref().as_bytes())
                    .map_err(|e| Error::SpawnFailed(e.to_string()))?,
            );
        }

        let slave = pty.slave_fd();

        match unsafe { fork() }? {
            ForkResult::Parent { child } => Ok(Self { pid: child }),
            ForkResult::Child => {
                // Only async-signal-safe work from here to execvp.
                if setsid().is_err() {
                    std::process::exit(1);
                }
                if unsafe { libc::ioctl(slave, libc::TIOCSCTTY as libc::c_ulong, 0) } < 0 {
                    std::process::exit(1);
                }
                if configure_slave(slave).is_err() {
                    std::process::exit(1);
                }
                if dup2(slave, libc::STDIN_FILENO).is_err()
                    || dup2(slave, libc::STDOUT_FILENO).is_err()
                    || dup2(slave, libc::STDERR_FILENO).is_err()
                {
                    std::process::exit(1);
                }
                if slave > libc::STDERR_FILENO {
                    unsafe { libc::close(slave) };
                }

                std::env::set_var("TERM", "xterm-256color");
                std::env::set_var("COLORTERM", "truecolor");
                for (key, value) in env {
                    std::env::set_var(key, value);
                }

                // Shells launched from a GUI start in / otherwise
                if let Some(home) = std::env::var_os("HOME") {
                    let _ = std::env::set_current_dir(&home);
                }

                let _ = execvp(&program_cstr, &argv);
                std::process::exit(127);
            }
        }
    }

    /// Spawn the user's shell ($SHELL, falling back to /bin/bash) as a
    /// login shell so profiles are sourced.
    pub fn spawn_shell(pty: &Pty) -> Result<Self> {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        Self::spawn(shell, ["-l".to_string()], &[], pty)
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn raw_pid(&self) -> RawFd {
        self.pid.as_raw()
    }

    pub fn is_running(&self) -> bool {
        matches!(
            waitpid(self.pid, Some(WaitPidFlag::WNOHANG)),
            Ok(WaitStatus::StillAlive)
        )
    }

    /// Non-blocking reap; `None` while the child is alive
    pub fn try_wait(&self) -> Result<Option<WaitStatus>> {
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status) => Ok(Some(status)),
            Err(e) => Err(Error::from(e)),
        }
    }

    pub fn wait(&self) -> Result<WaitStatus> {
        waitpid(self.pid, None).map_err(Error::from)
    }

    pub fn signal(&self, signal: Signal) -> Result<()> {
        kill(self.pid, signal).map_err(Error::from)
    }

    /// Propagate a resize to the kernel and notify the child
    pub fn resize(&self, pty: &Pty, size: crate::WindowSize) -> Result<()> {
        pty.set_window_size(size)?;
        let _ = self.signal(Signal::SIGWINCH);
        Ok(())
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        let _ = self.signal(Signal::SIGHUP);
        let _ = waitpid(self.pid, Some(WaitPidFlag::WNOHANG));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WindowSize;
    use std::time::Duration;

    #[test]
    fn test_spawn_echo() {
        let mut pty = Pty::open(WindowSize::default()).unwrap();
        let child = Child::spawn("/bin/echo", ["hello"], &[], &pty).unwrap();

        let mut buf = [0u8; 1024];
        let mut output = String::new();
        for _ in 0..50 {
            match pty.read(&mut buf, Some(Duration::from_millis(100))) {
                Ok(Some(event)) => {
                    output.push_str(&String::from_utf8_lossy(&buf[..event.len]));
                    if output.contains("hello") {
                        break;
                    }
                }
                Ok(None) => {}
                Err(_) => break,
            }
        }
        assert!(output.contains("hello"), "unexpected output: {:?}", output);
        let _ = child.wait();
    }

    #[test]
    fn test_spawn_cat_roundtrip() {
        let mut pty = Pty::open(WindowSize::default()).unwrap();
        let child = Child::spawn("/bin/cat", Vec::<String>::new(), &[], &pty).unwrap();

        pty.write(b"ping\n").unwrap();

        let mut buf = [0u8; 1024];
        let mut output = String::new();
        for _ in 0..50 {
            match pty.read(&mut buf, Some(Duration::from_millis(100))) {
                Ok(Some(event)) => {
                    output.push_str(&String::from_utf8_lossy(&buf[..event.len]));
                    if output.contains("ping") {
                        break;
                    }
                }
                Ok(None) => {}
                Err(_) => break,
            }
        }
        assert!(output.contains("ping"), "unexpected output: {:?}", output);
        let _ = child.signal(Signal::SIGTERM);
    }

    #[test]
    fn test_resize_propagates() {
        let pty = Pty::open(WindowSize::default()).unwrap();
        let child = Child::spawn("/bin/sleep", ["5"], &[], &pty).unwrap();
        child.resize(&pty, WindowSize::new(132, 50)).unwrap();
        let size = pty.window_size().unwrap();
        assert_eq!(size.cols, 132);
        assert_eq!(size.rows, 50);
        let _ = child.signal(Signal::SIGKILL);
        let _ = child.wait();
    }
}
