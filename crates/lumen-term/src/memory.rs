// SPDX-License-Identifier: MIT
//
// In-memory terminal backend.
//
// A deterministic stand-in for a real TTY. Every `write` lands in a shared
// transcript, `clear` is counted, and input bytes are injected through a
// channel. The handle is `Clone`: a test keeps one clone to inspect and
// drive, and hands another to the session.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::terminal::{InputStream, Terminal, stream_taken};

struct Inner {
    writes: Vec<String>,
    clears: usize,
    width: Option<usize>,
    input: Option<InputStream>,
    closed: bool,
    fail_writes: bool,
}

/// A terminal that records output in memory.
///
/// ```
/// use lumen_term::{MemoryTerminal, Terminal};
///
/// let term = MemoryTerminal::with_width(40);
/// let mut backend = term.clone();
/// backend.write("hi").unwrap();
/// assert_eq!(term.output(), "hi");
/// ```
#[derive(Clone)]
pub struct MemoryTerminal {
    inner: Arc<Mutex<Inner>>,
    sender: Sender<io::Result<Vec<u8>>>,
}

impl MemoryTerminal {
    /// A terminal with unbounded width.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A terminal `width` columns wide.
    #[must_use]
    pub fn with_width(width: usize) -> Self {
        Self::build(Some(width))
    }

    fn build(width: Option<usize>) -> Self {
        let (sender, rx) = mpsc::channel();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                writes: Vec::new(),
                clears: 0,
                width,
                input: Some(rx),
                closed: false,
                fail_writes: false,
            })),
            sender,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the reported width.
    pub fn set_width(&self, width: Option<usize>) {
        self.lock().width = width;
    }

    /// Queue raw input bytes, as if typed.
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        // A closed session no longer listens; that is not the sender's problem.
        let _ = self.sender.send(Ok(bytes.into()));
    }

    /// Deliver a read failure, as if the input device broke.
    pub fn fail_input(&self, error: io::Error) {
        let _ = self.sender.send(Err(error));
    }

    /// A sender for injecting input from another thread.
    #[must_use]
    pub fn input(&self) -> Sender<io::Result<Vec<u8>>> {
        self.sender.clone()
    }

    /// Make every subsequent `write` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Each `write` call, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    /// Everything written, concatenated.
    #[must_use]
    pub fn output(&self) -> String {
        self.lock().writes.concat()
    }

    /// Number of `write` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Number of `clear` calls so far.
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }

    /// Whether `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Default for MemoryTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for MemoryTerminal {
    fn width(&self) -> Option<usize> {
        self.lock().width
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"));
        }
        if inner.fail_writes {
            return Err(io::Error::other("injected write failure"));
        }
        inner.writes.push(text.to_owned());
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        let mut inner = self.lock();
        inner.clears += 1;
        inner.writes.clear();
        Ok(())
    }

    fn read(&mut self) -> io::Result<InputStream> {
        self.lock().input.take().ok_or_else(stream_taken)
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
