// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background stdin reader.
//
// `read()` on stdin blocks, and a session's input lane also has to notice
// ESC timeouts and shutdown. So the bytes are collected on their own thread
// and handed over through a channel; the input lane then waits on the
// channel with `recv_timeout`, which gives it both.
//
// The reader thread `poll()`s stdin with a short timeout and checks a stop
// flag between polls, so stopping it never leaves a thread stuck inside a
// blocking `read()`. Dropping the reader stops it.
//
// EOF and any poll or read error other than EINTR end the stream: the
// error goes down the channel as the last item and the thread exits.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Bytes requested per `read()`. A keypress is 1–6 bytes; a paste into
/// raw mode can be kilobytes.
const READ_BUF_SIZE: usize = 4096;

/// Poll timeout between stop-flag checks (milliseconds). Bounds the
/// latency of [`StdinReader::stop`].
const POLL_TIMEOUT_MS: i32 = 50;

/// Owns the thread that forwards raw stdin bytes into a channel.
///
/// The channel closes when the reader is stopped, stdin fails or reaches
/// EOF (reported as a final `Err` item), or the receiving side is dropped.
pub struct StdinReader {
    /// `None` once `stop()` has joined the thread.
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StdinReader {
    /// Start the reader thread.
    ///
    /// Returns the reader and the receiving end of its byte channel. Every
    /// chunk received is non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn() -> io::Result<(Self, Receiver<io::Result<Vec<u8>>>)> {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("lumen-stdin".into())
            .spawn(move || read_loop(&tx, &stop_flag))?;

        tracing::debug!("stdin reader started");
        Ok((
            Self {
                handle: Some(handle),
                stop,
            },
            rx,
        ))
    }

    /// Whether the reader thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the thread to exit and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            tracing::debug!("stdin reader stopped");
        }
    }
}

impl Drop for StdinReader {
    fn drop(&mut self) {
        self.stop();
    }
}

type Chunks = Sender<io::Result<Vec<u8>>>;

fn end_of_input() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed")
}

/// Report the error that ended the stream.
fn finish(tx: &Chunks, err: io::Error) {
    tracing::debug!(%err, "stdin reader ending");
    let _ = tx.send(Err(err));
}

#[cfg(unix)]
fn read_loop(tx: &Chunks, stop: &AtomicBool) {
    use std::os::unix::io::AsRawFd;

    let fd = io::stdin().as_raw_fd();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, POLL_TIMEOUT_MS)
        };
        if ready == 0 {
            continue;
        }
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return finish(tx, err);
        }

        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n == 0 {
            return finish(tx, end_of_input());
        }
        if n < 0 {
            let err = io::Error::last_os_error();
            if matches!(
                err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ) {
                continue;
            }
            return finish(tx, err);
        }

        #[allow(clippy::cast_sign_loss)] // n > 0 checked above.
        let chunk = buf[..n as usize].to_vec();
        if tx.send(Ok(chunk)).is_err() {
            break;
        }
    }
}

/// Without `poll()` the thread can only notice `stop` between reads.
#[cfg(not(unix))]
fn read_loop(tx: &Chunks, stop: &AtomicBool) {
    use std::io::Read;

    let stdin = io::stdin();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        match stdin.lock().read(&mut buf) {
            Ok(0) => return finish(tx, end_of_input()),
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return finish(tx, err),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
