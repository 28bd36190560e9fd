// SPDX-License-Identifier: MIT
//
// The terminal capability, and the real-TTY backend.
//
// Safety: the TTY backend uses `unsafe` for termios (tcgetattr, tcsetattr),
// ioctl (TIOCGWINSZ), isatty, and one raw fd write in the panic hook. These
// are the POSIX interfaces for terminal control; each block is minimal.
#![allow(unsafe_code)]
//
// Everything above this module talks to a `Terminal` trait object and
// nothing else. A session needs five things from its output device: the
// column count (or "unbounded"), a way to write ANSI text, a way to wipe
// what was written, the raw input byte stream, and a way to let go.
//
// `TtyTerminal` renders inline: no alternate screen, no absolute cursor
// addressing. It switches stdin to raw mode so keys arrive unbuffered and
// Ctrl+C arrives as a byte rather than SIGINT, and hides the cursor while a
// session owns the terminal. A panic hook restores the terminal before the
// panic message prints, writing straight to fd 1 so a panic that happened
// while stdout was locked cannot deadlock it.

use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::sync::{Mutex, Once};

use crate::ansi;
use crate::reader::StdinReader;

// ─── Capability ─────────────────────────────────────────────────────────────

/// An output device a session can render into.
///
/// All writes come from a single lane, so implementations need no internal
/// synchronization for output. `Send` lets the session move the terminal
/// onto that lane.
pub trait Terminal: Send {
    /// Current column count. `None` means unbounded: lines never soft-wrap.
    fn width(&self) -> Option<usize>;

    /// Write ANSI-laden text.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the session that owns the terminal.
    fn write(&mut self, text: &str) -> io::Result<()>;

    /// Erase all prior output.
    ///
    /// # Errors
    ///
    /// Same failure policy as [`write`](Self::write).
    fn clear(&mut self) -> io::Result<()>;

    /// Take the raw input byte stream.
    ///
    /// The stream is not restartable: a second call fails. A read failure
    /// arrives as an `Err` item, after which the stream ends.
    ///
    /// # Errors
    ///
    /// Fails if the stream was already taken or cannot be started.
    fn read(&mut self) -> io::Result<InputStream>;

    /// Release the backend. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if restoring the device fails.
    fn close(&mut self) -> io::Result<()>;
}

/// Raw input chunks from a terminal, or the error that ended them.
pub type InputStream = Receiver<io::Result<Vec<u8>>>;

/// The error a second [`Terminal::read`] call returns.
#[must_use]
pub fn stream_taken() -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, "input stream already taken")
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Column count of the terminal on stdout via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or the query fails.
#[cfg(unix)]
#[must_use]
pub fn query_width() -> Option<usize> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    (result == 0 && ws.ws_col > 0).then_some(usize::from(ws.ws_col))
}

#[cfg(not(unix))]
#[must_use]
pub fn query_width() -> Option<usize> {
    None
}

/// Whether stdin is connected to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Panic-Safe Restore ─────────────────────────────────────────────────────

/// Original termios, reachable from the panic hook.
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref original) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}

/// Reset SGR, show the cursor, and start a fresh line so the panic message
/// does not land in the middle of a half-painted section.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[0m\x1b[?25h\r\n";

static PANIC_HOOK_INSTALLED: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if TTY_ACTIVE.lock().is_ok_and(|active| *active) && !on_lumen_lane() {
                emergency_restore();
                #[cfg(unix)]
                restore_termios_from_backup();
            }
            original(info);
        }));
    });
}

/// Whether a `TtyTerminal` currently holds the terminal in raw mode.
static TTY_ACTIVE: Mutex<bool> = Mutex::new(false);

/// Panics on a session's own threads (render blocks, listeners, timers) are
/// caught and reported by the session, which keeps the terminal. Only a
/// panic elsewhere is the end of the program.
fn on_lumen_lane() -> bool {
    std::thread::current()
        .name()
        .is_some_and(|name| name.starts_with(LANE_PREFIX))
}

/// Thread-name prefix of every thread a lumen session spawns.
pub const LANE_PREFIX: &str = "lumen-";

fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

// ─── TtyTerminal ────────────────────────────────────────────────────────────

/// The process's own terminal: stdout for output, stdin for input.
///
/// Opening it enters raw mode and hides the cursor; [`close`](Terminal::close)
/// (or dropping it) undoes both.
///
/// ```no_run
/// use lumen_term::{Terminal, TtyTerminal};
///
/// let mut term = TtyTerminal::open()?;
/// term.write("hello\r\n")?;
/// term.close()?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct TtyTerminal {
    #[cfg(unix)]
    original_termios: Option<libc::termios>,
    reader: Option<StdinReader>,
    input_taken: bool,
    active: bool,
}

impl TtyTerminal {
    /// Take over the terminal.
    ///
    /// Raw mode is skipped when stdin is not a TTY (pipes, CI), so opening
    /// succeeds there too.
    ///
    /// # Errors
    ///
    /// Returns an error if termios or the initial write fails.
    pub fn open() -> io::Result<Self> {
        install_panic_hook();

        let mut term = Self {
            #[cfg(unix)]
            original_termios: None,
            reader: None,
            input_taken: false,
            active: false,
        };
        term.enable_raw_mode()?;

        let stdout = io::stdout();
        let mut lock = stdout.lock();
        ansi::cursor_hide(&mut lock)?;
        lock.flush()?;
        drop(lock);

        term.active = true;
        if let Ok(mut active) = TTY_ACTIVE.lock() {
            *active = true;
        }
        tracing::debug!(tty = is_tty(), "terminal opened");
        Ok(term)
    }

    /// Whether the terminal is still held (not yet closed).
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    // ── Raw Mode (termios) ──────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        if !is_tty() {
            return Ok(());
        }

        let fd = io::stdin().as_raw_fd();

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }

            // cfmakeraw equivalent. ISIG off: Ctrl+C is delivered as 0x03.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            use std::os::unix::io::AsRawFd;
            let fd = io::stdin().as_raw_fd();

            unsafe {
                if libc::tcsetattr(fd, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Terminal for TtyTerminal {
    fn width(&self) -> Option<usize> {
        query_width()
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(text.as_bytes())?;
        lock.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        ansi::clear_screen(&mut lock)?;
        lock.flush()
    }

    fn read(&mut self) -> io::Result<InputStream> {
        if self.input_taken {
            return Err(stream_taken());
        }
        let (reader, rx) = StdinReader::spawn()?;
        self.reader = Some(reader);
        self.input_taken = true;
        Ok(rx)
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }

        let stdout = io::stdout();
        let mut lock = stdout.lock();
        ansi::reset(&mut lock)?;
        ansi::cursor_show(&mut lock)?;
        lock.flush()?;
        drop(lock);

        self.disable_raw_mode()?;
        if let Ok(mut active) = TTY_ACTIVE.lock() {
            *active = false;
        }
        tracing::debug!("terminal closed");
        Ok(())
    }
}

impl Drop for TtyTerminal {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_width_does_not_panic() {
        if let Some(w) = query_width() {
            assert!(w > 0);
        }
    }

    #[test]
    fn is_tty_does_not_panic() {
        let _ = is_tty();
    }

    #[test]
    fn emergency_restore_shows_cursor_and_resets() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.contains("\x1b[0m"));
        assert!(s.contains("\x1b[?25h"));
        assert!(!s.contains("\x1b[?1049"), "inline terminals never use the alt screen");
    }

    #[test]
    fn stream_taken_kind() {
        assert_eq!(stream_taken().kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn open_close_cycle() {
        let mut term = TtyTerminal::open().unwrap();
        assert!(term.is_active());
        term.close().unwrap();
        assert!(!term.is_active());
    }

    #[test]
    fn close_is_idempotent() {
        let mut term = TtyTerminal::open().unwrap();
        term.close().unwrap();
        term.close().unwrap();
    }

    #[test]
    fn read_twice_fails() {
        let mut term = TtyTerminal::open().unwrap();
        let _rx = term.read().unwrap();
        let err = term.read().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        term.close().unwrap();
    }
}
