// SPDX-License-Identifier: MIT
//
// Session — owns a terminal and the lanes that serve it.
//
// Opening a session takes the terminal's input stream, moves the terminal
// onto the render lane, and starts the input lane (and, when asked, a
// signal thread). Sections run one at a time on the owner's thread; the
// lanes come to them through `Shared`.
//
// Teardown happens once, whichever way it is reached: `close`, drop, an
// interrupt, or a signal. It stops the active run, cancels its timers, runs
// the dispose callbacks within the grace period, and releases the terminal.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lumen_render::Renderer;
use lumen_term::terminal::{Terminal, TtyTerminal};

use crate::config::SessionConfig;
use crate::dispose::DisposeRegistry;
use crate::error::{Error, Result};
use crate::input;
use crate::lane::{Command, Lane};
use crate::live_var::LiveVar;
use crate::section::{Section, SectionCore};

/// Exit status after an interrupt, as a shell reports death by SIGINT.
const INTERRUPT_EXIT_CODE: i32 = 130;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Shared ─────────────────────────────────────────────────────────────────

/// State every lane of a session can reach.
pub(crate) struct Shared {
    pub(crate) config: SessionConfig,
    commands: Mutex<Option<Sender<Command>>>,
    active: Mutex<Option<Arc<SectionCore>>>,
    failure: Mutex<Option<Error>>,
    dispose: DisposeRegistry,
    closed: AtomicBool,
    interrupted: AtomicBool,
}

impl Shared {
    pub(crate) fn new(config: SessionConfig, commands: Sender<Command>) -> Self {
        Self {
            config,
            commands: Mutex::new(Some(commands)),
            active: Mutex::new(None),
            failure: Mutex::new(None),
            dispose: DisposeRegistry::new(),
            closed: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Queue a command for the render lane. `false` once the lane is gone.
    pub(crate) fn send(&self, command: Command) -> bool {
        lock(&self.commands)
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn active(&self) -> Option<Arc<SectionCore>> {
        lock(&self.active).clone()
    }

    /// Repaint the active section, if there is one.
    pub(crate) fn request_render(&self) {
        if let Some(section) = self.active() {
            section.request_render(self);
        }
    }

    pub(crate) fn failure(&self) -> Option<Error> {
        lock(&self.failure).clone()
    }

    /// A fatal failure: remember it and end the active run.
    pub(crate) fn record_failure(&self, error: Error) {
        lock(&self.failure).get_or_insert(error);
        if let Some(section) = self.active() {
            section.stop.raise();
        }
    }

    // ── Section lifecycle ───────────────────────────────────────────────

    pub(crate) fn begin(&self, section: &Arc<SectionCore>) -> Result<()> {
        if let Some(error) = self.failure() {
            return Err(error);
        }
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let mut active = lock(&self.active);
        if active.is_some() {
            return Err(Error::SectionActive);
        }
        if !section.claim() {
            return Err(Error::SectionFinished);
        }
        *active = Some(Arc::clone(section));
        drop(active);
        // A failure recorded while the slot was empty reached no run.
        if self.failure().is_some() {
            section.stop.raise();
        }

        self.send(Command::Begin(Arc::clone(section)));
        section.request_render(self);
        Ok(())
    }

    /// Final pass for `section`. Returns the session-level outcome of the
    /// run; the section's own failure is reported by the caller.
    pub(crate) fn finish(&self, section: &Arc<SectionCore>) -> Result<()> {
        let (done_tx, done_rx) = mpsc::channel();
        if self.send(Command::Finish {
            section: Arc::clone(section),
            rerender: !section.final_render_skipped(),
            done: done_tx,
        }) {
            done_rx.recv().ok();
        } else {
            section.mark_finished();
        }

        {
            let mut active = lock(&self.active);
            if active.as_ref().is_some_and(|a| Arc::ptr_eq(a, section)) {
                *active = None;
            }
        }

        if let Some(error) = self.failure() {
            return Err(error);
        }
        if self.interrupted.load(Ordering::Acquire) {
            return Err(Error::Interrupted);
        }
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    // ── Teardown ────────────────────────────────────────────────────────

    /// Tear the session down. Only the first call does anything.
    ///
    /// Waits for the render lane to release the terminal, at most `wait` if
    /// given.
    fn shutdown(&self, wait: Option<Duration>) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!("session closing");

        if let Some(section) = self.active() {
            section.cancel_timers();
            section.stop.raise();
        }
        self.dispose.run_all(self.config.dispose_grace);

        let (done_tx, done_rx) = mpsc::channel();
        let sent = self.send(Command::Close(done_tx));
        // Later sends fail fast instead of queueing behind a dead lane.
        lock(&self.commands).take();
        if !sent {
            return Ok(());
        }
        let acked = match wait {
            Some(timeout) => done_rx.recv_timeout(timeout).ok(),
            None => done_rx.recv().ok(),
        };
        acked.unwrap_or(Ok(()))
    }

    /// Ctrl+C or a termination signal.
    pub(crate) fn interrupt(&self) {
        if self.interrupted.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!("session interrupted");
        if let Err(err) = self.shutdown(Some(self.config.dispose_grace)) {
            tracing::warn!(%err, "terminal restore failed during interrupt");
        }
        if self.config.exit_on_interrupt {
            std::process::exit(INTERRUPT_EXIT_CODE);
        }
    }
}

// ─── Session ────────────────────────────────────────────────────────────────

/// A live connection between sections and a terminal.
///
/// Closed on drop. Prefer [`session`] or [`session_with`], which close it
/// for you and report the close error.
pub struct Session {
    shared: Arc<Shared>,
    lane: Option<JoinHandle<()>>,
    input: Option<JoinHandle<()>>,
    #[cfg(unix)]
    signals: Option<SignalGuard>,
}

impl Session {
    /// Start a session on `terminal`.
    ///
    /// # Errors
    ///
    /// [`Error::InputStreamTaken`] if the terminal's input stream was
    /// already taken, or [`Error::Io`] if a lane thread or the signal
    /// handler cannot be started.
    pub fn open(terminal: impl Terminal + 'static, config: SessionConfig) -> Result<Self> {
        let mut terminal: Box<dyn Terminal> = Box::new(terminal);
        let bytes = terminal.read().map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                Error::InputStreamTaken
            } else {
                Error::from(err)
            }
        })?;

        let (tx, rx) = mpsc::channel();
        let handle_signals = config.handle_signals;
        let shared = Arc::new(Shared::new(config, tx));

        let lane = Lane::new(terminal, Arc::clone(&shared));
        let lane = thread::Builder::new()
            .name("lumen-render".into())
            .spawn(move || lane.run(&rx))?;

        let mut session = Self {
            shared,
            lane: Some(lane),
            input: None,
            #[cfg(unix)]
            signals: None,
        };

        let shared = Arc::clone(&session.shared);
        session.input = Some(
            thread::Builder::new()
                .name("lumen-input".into())
                .spawn(move || input::run(&shared, &bytes))?,
        );

        #[cfg(unix)]
        if handle_signals {
            session.signals = Some(SignalGuard::install(&session.shared)?);
        }
        #[cfg(not(unix))]
        let _ = handle_signals;

        tracing::debug!("session opened");
        Ok(session)
    }

    /// Declare a section drawn by `render`. Nothing is painted until it
    /// runs.
    pub fn section(&self, render: impl Fn(&mut Renderer) + Send + Sync + 'static) -> Section {
        Section::new(Arc::clone(&self.shared), render)
    }

    /// A [`LiveVar`] whose changes repaint the active section.
    pub fn live_var<T>(&self, initial: T) -> LiveVar<T>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let var = LiveVar::new(initial);
        let shared = Arc::downgrade(&self.shared);
        var.subscribe(move |_| {
            if let Some(shared) = shared.upgrade() {
                shared.request_render();
            }
        });
        var
    }

    /// Register cleanup to run when the session ends, normally or by
    /// interrupt. Callbacks run once, in registration order, within
    /// [`SessionConfig::dispose_grace`].
    pub fn on_dispose(&self, callback: impl FnOnce() + Send + 'static) {
        if !self.shared.dispose.register(callback) {
            tracing::debug!("dispose callback registered after teardown, dropped");
        }
    }

    /// Erase the terminal and repaint the active section from scratch.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if the session is closed, or the terminal failure.
    pub fn clear(&self) -> Result<()> {
        let (done_tx, done_rx) = mpsc::channel();
        if !self.shared.send(Command::Clear(done_tx)) {
            return Err(Error::Closed);
        }
        done_rx.recv().unwrap_or(Err(Error::Closed))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Tear the session down and release the terminal. Idempotent.
    ///
    /// # Errors
    ///
    /// The first fatal terminal failure of the session, or the error from
    /// restoring the terminal.
    pub fn close(&mut self) -> Result<()> {
        let restored = self.shared.shutdown(None);
        #[cfg(unix)]
        drop(self.signals.take());
        for handle in [self.lane.take(), self.input.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::error!("session lane panicked");
            }
        }
        if let Some(error) = self.shared.failure() {
            return Err(error);
        }
        restored.map_err(Error::from)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::debug!(%err, "session closed with error");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// Run `body` in a session on the process's terminal.
///
/// The terminal goes into raw mode for the duration and is restored
/// afterwards, also on panic or interrupt.
///
/// # Errors
///
/// Whatever `body` returns, else any failure opening or closing the
/// session.
pub fn session<R>(body: impl FnOnce(&Session) -> Result<R>) -> Result<R> {
    let terminal = TtyTerminal::open()?;
    session_with(terminal, SessionConfig::tty(), body)
}

/// Run `body` in a session on `terminal`.
///
/// # Errors
///
/// Whatever `body` returns, else any failure opening or closing the
/// session.
pub fn session_with<R>(
    terminal: impl Terminal + 'static,
    config: SessionConfig,
    body: impl FnOnce(&Session) -> Result<R>,
) -> Result<R> {
    let mut session = Session::open(terminal, config)?;
    let result = body(&session);
    let closed = session.close();
    let value = result?;
    closed.map(|()| value)
}

// ─── Signals ────────────────────────────────────────────────────────────────

/// SIGINT and SIGTERM interrupt the session; SIGWINCH repaints it at the
/// new width.
#[cfg(unix)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn install(shared: &Arc<Shared>) -> io::Result<Self> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM, SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let shared = Arc::downgrade(shared);
        let thread = thread::Builder::new()
            .name("lumen-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    let Some(shared) = shared.upgrade() else {
                        break;
                    };
                    match signal {
                        SIGWINCH => {
                            tracing::debug!("SIGWINCH received");
                            shared.request_render();
                        }
                        SIGINT | SIGTERM => {
                            tracing::warn!(signal, "termination signal received");
                            shared.interrupt();
                        }
                        _ => {}
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
