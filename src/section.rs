// SPDX-License-Identifier: MIT
//
// Sections — a render block plus the run that keeps it on screen.
//
// `Section` is the owner's handle, `SectionCore` the state the lanes share,
// and `RunScope` what a run body gets to talk to the section with.
//
// Status moves Idle → RenderRequested → Rendering → Idle for as long as the
// section runs, and ends at Finished after the final paint. A render
// request made while one is already pending is absorbed by it; a request
// made mid-paint flips the status back to RenderRequested so the render
// lane goes around once more before going idle. Either way at most one
// pass is ever queued behind the one in flight.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lumen_render::{Renderer, TextBuffer};
use lumen_term::input::{Event, KeyCode, KeyEvent};

use crate::error::{Error, Result, panic_message};
use crate::input::{InputEntered, LineInput};
use crate::lane::Command;
use crate::session::Shared;
use crate::signal::Signal;
use crate::timer::{self, TimerHandle};

type RenderBlock = Box<dyn Fn(&mut Renderer) + Send + Sync>;
type KeyListener = Arc<dyn Fn(&KeyEvent) + Send + Sync>;
type EventListener = Arc<dyn Fn(&Event) + Send + Sync>;
type EnteredListener = Arc<dyn Fn(&InputEntered) + Send + Sync>;
type FinishingCallback = Box<dyn FnOnce() + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run every listener in `listeners` with `arg`, isolating panics.
fn notify_all<A: ?Sized>(listeners: &[Arc<dyn Fn(&A) + Send + Sync>], arg: &A, what: &str) {
    for listener in listeners {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(arg))) {
            tracing::warn!(
                listener = what,
                panic = %panic_message(payload.as_ref()),
                "listener panicked"
            );
        }
    }
}

// ─── Status ─────────────────────────────────────────────────────────────────

/// Where a section is in its render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Idle = 0,
    RenderRequested = 1,
    Rendering = 2,
    Finished = 3,
}

impl Status {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::RenderRequested,
            2 => Self::Rendering,
            _ => Self::Finished,
        }
    }
}

// ─── Core ───────────────────────────────────────────────────────────────────

pub(crate) struct SectionCore {
    render: RenderBlock,
    status: AtomicU8,
    started: AtomicBool,
    failure: Mutex<Option<Error>>,

    input_enabled: AtomicBool,
    line: Mutex<LineInput>,
    stop_on_entered: AtomicBool,
    skip_final: AtomicBool,

    key_listeners: Mutex<Vec<KeyListener>>,
    event_listeners: Mutex<Vec<EventListener>>,
    entered_listeners: Mutex<Vec<EnteredListener>>,
    finishing: Mutex<Vec<FinishingCallback>>,
    timers: Mutex<Vec<TimerHandle>>,

    /// Raised when the run should end: `signal()`, the awaited key or
    /// input, a fatal failure, or session shutdown.
    pub(crate) stop: Signal,
}

impl SectionCore {
    fn new(render: RenderBlock) -> Self {
        Self {
            render,
            status: AtomicU8::new(Status::Idle as u8),
            started: AtomicBool::new(false),
            failure: Mutex::new(None),
            input_enabled: AtomicBool::new(false),
            line: Mutex::new(LineInput::default()),
            stop_on_entered: AtomicBool::new(false),
            skip_final: AtomicBool::new(false),
            key_listeners: Mutex::new(Vec::new()),
            event_listeners: Mutex::new(Vec::new()),
            entered_listeners: Mutex::new(Vec::new()),
            finishing: Mutex::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
            stop: Signal::new(),
        }
    }

    pub(crate) fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    fn transition(&self, from: Status, to: Status) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // ── Scheduling ──────────────────────────────────────────────────────

    /// Ask the render lane for a pass. Coalesces with any pass already
    /// pending; dropped once the section finished or the session closed.
    pub(crate) fn request_render(&self, shared: &Shared) {
        if shared.is_closed() {
            return;
        }
        loop {
            match self.status() {
                Status::Idle => {
                    if self.transition(Status::Idle, Status::RenderRequested) {
                        shared.send(Command::Wake);
                        return;
                    }
                }
                Status::Rendering => {
                    if self.transition(Status::Rendering, Status::RenderRequested) {
                        return;
                    }
                }
                Status::RenderRequested => {
                    tracing::trace!("render request coalesced");
                    return;
                }
                Status::Finished => return,
            }
        }
    }

    /// Render lane: claim a requested pass.
    pub(crate) fn start_pass(&self) -> bool {
        self.transition(Status::RenderRequested, Status::Rendering)
    }

    /// Render lane: end a pass. `false` means another pass was requested
    /// meanwhile and should run now.
    pub(crate) fn end_pass(&self) -> bool {
        self.transition(Status::Rendering, Status::Idle)
    }

    /// Claim the one run this section gets. `false` if it was claimed.
    pub(crate) fn claim(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn mark_finished(&self) {
        self.status.store(Status::Finished as u8, Ordering::Release);
        self.input_enabled.store(false, Ordering::Release);
    }

    pub(crate) fn render_into(&self, renderer: &mut Renderer) {
        (self.render)(renderer);
    }

    pub(crate) fn final_render_skipped(&self) -> bool {
        self.skip_final.load(Ordering::Acquire)
    }

    // ── Failure ─────────────────────────────────────────────────────────

    /// Record a failure for the owner of the run and end the run. The
    /// first failure wins.
    pub(crate) fn fail(&self, error: Error) {
        lock(&self.failure).get_or_insert(error);
        self.stop.raise();
    }

    fn take_failure(&self) -> Option<Error> {
        lock(&self.failure).take()
    }

    // ── Line input ──────────────────────────────────────────────────────

    pub(crate) fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn with_line<R>(&self, f: impl FnOnce(&mut LineInput) -> R) -> R {
        f(&mut lock(&self.line))
    }

    /// Text and cursor for the next pass's input widget.
    pub(crate) fn input_snapshot(&self) -> (String, usize) {
        let line = lock(&self.line);
        (line.text().to_owned(), line.cursor())
    }

    /// An entered line was accepted by every listener.
    pub(crate) fn input_accepted(&self) {
        if self.stop_on_entered.load(Ordering::Acquire) {
            self.stop.raise();
        }
    }

    // ── Listeners ───────────────────────────────────────────────────────

    pub(crate) fn notify_key(&self, key: &KeyEvent) {
        let listeners = lock(&self.key_listeners).clone();
        notify_all(&listeners, key, "key");
    }

    pub(crate) fn notify_event(&self, event: &Event) {
        let listeners = lock(&self.event_listeners).clone();
        notify_all(&listeners, event, "event");
    }

    pub(crate) fn notify_entered(&self, entered: &InputEntered) {
        let listeners = lock(&self.entered_listeners).clone();
        notify_all(&listeners, entered, "input entered");
    }

    // ── Teardown ────────────────────────────────────────────────────────

    pub(crate) fn cancel_timers(&self) {
        for timer in lock(&self.timers).drain(..) {
            timer.cancel();
        }
    }

    fn run_finishing(&self) {
        let callbacks = std::mem::take(&mut *lock(&self.finishing));
        for callback in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                tracing::warn!(
                    panic = %panic_message(payload.as_ref()),
                    "on_finishing callback panicked"
                );
            }
        }
    }

    fn drop_listeners(&self) {
        lock(&self.key_listeners).clear();
        lock(&self.event_listeners).clear();
        lock(&self.entered_listeners).clear();
    }
}

// ─── Section ────────────────────────────────────────────────────────────────

/// A render block declared in a session, ready to run once.
///
/// ```no_run
/// # fn main() -> lumen::Result<()> {
/// lumen::session(|session| {
///     let count = session.live_var(0);
///     let shown = count.clone();
///     session
///         .section(move |r| {
///             r.textln(format!("count: {}", shown.get()));
///         })
///         .run(|_| {
///             for _ in 0..3 {
///                 count.update(|n| n + 1);
///             }
///         })
/// })
/// # }
/// ```
pub struct Section {
    core: Arc<SectionCore>,
    shared: Arc<Shared>,
}

/// How a run decides it is over once its body returned.
enum Until {
    BodyReturns,
    Stopped,
    KeyPressed(Vec<KeyCode>),
    InputEntered,
}

impl Section {
    pub(crate) fn new(
        shared: Arc<Shared>,
        render: impl Fn(&mut Renderer) + Send + Sync + 'static,
    ) -> Self {
        Self {
            core: Arc::new(SectionCore::new(Box::new(render))),
            shared,
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.core.status()
    }

    /// Register a callback that runs after the run body returns, before the
    /// final paint. Values it sets are what that paint shows.
    pub fn on_finishing(&self, callback: impl FnOnce() + Send + 'static) -> &Self {
        lock(&self.core.finishing).push(Box::new(callback));
        self
    }

    /// Paint the section, run `body` while the section keeps repainting on
    /// demand, then paint once more and finish. See
    /// [`RunScope::skip_final_render`] to leave out that last paint.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if the session is closed, [`Error::SectionFinished`]
    /// if this section already ran, [`Error::SectionActive`] if another
    /// section is running. Once running: the first render-block panic
    /// ([`Error::RenderPanicked`]), terminal failure ([`Error::Io`]), or
    /// [`Error::Interrupted`].
    ///
    /// # Panics
    ///
    /// A panic in `body` is re-raised after the section has finished.
    pub fn run<R>(&self, body: impl FnOnce(&RunScope) -> R) -> Result<R> {
        self.run_inner(Until::BodyReturns, body)
    }

    /// Like [`run`](Self::run), but after `body` returns keep going until
    /// [`RunScope::signal`] is called.
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run).
    pub fn run_until_signal<R>(&self, body: impl FnOnce(&RunScope) -> R) -> Result<R> {
        self.run_inner(Until::Stopped, body)
    }

    /// Like [`run`](Self::run), but keep going until one of `keys` is
    /// pressed.
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run).
    pub fn run_until_key_pressed<R>(
        &self,
        keys: &[KeyCode],
        body: impl FnOnce(&RunScope) -> R,
    ) -> Result<R> {
        self.run_inner(Until::KeyPressed(keys.to_vec()), body)
    }

    /// Like [`run`](Self::run), but keep going until a line of input is
    /// entered and accepted by every input-entered listener.
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run).
    pub fn run_until_input_entered<R>(&self, body: impl FnOnce(&RunScope) -> R) -> Result<R> {
        self.run_inner(Until::InputEntered, body)
    }

    fn run_inner<R>(&self, until: Until, body: impl FnOnce(&RunScope) -> R) -> Result<R> {
        let core = &self.core;
        self.shared.begin(core)?;
        tracing::debug!("section started");
        self.arm(&until);

        let scope = RunScope {
            core: Arc::clone(core),
            shared: Arc::clone(&self.shared),
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&scope)));
        if outcome.is_ok() && !matches!(until, Until::BodyReturns) {
            core.stop.wait();
        }

        core.cancel_timers();
        if core.final_render_skipped() {
            // Repaints requested from here on, `on_finishing` included, are
            // dropped.
            core.mark_finished();
        }
        core.run_finishing();
        let finished = self.shared.finish(core);
        core.drop_listeners();
        tracing::debug!("section finished");

        let value = match outcome {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        };
        if let Some(error) = core.take_failure() {
            return Err(error);
        }
        finished.map(|()| value)
    }

    /// Hook up the stop condition of a run that has begun.
    fn arm(&self, until: &Until) {
        match until {
            Until::KeyPressed(keys) => {
                let keys = keys.clone();
                let core = Arc::downgrade(&self.core);
                lock(&self.core.key_listeners).push(Arc::new(move |key: &KeyEvent| {
                    if keys.contains(&key.code) {
                        if let Some(core) = core.upgrade() {
                            core.stop.raise();
                        }
                    }
                }));
            }
            Until::InputEntered => self.core.stop_on_entered.store(true, Ordering::Release),
            Until::BodyReturns | Until::Stopped => {}
        }
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ─── RunScope ───────────────────────────────────────────────────────────────

/// What a run body uses to drive its section.
///
/// Cloneable, so timers and other threads can hold one. Operations on a
/// scope whose run has ended are ignored.
#[derive(Clone)]
pub struct RunScope {
    core: Arc<SectionCore>,
    shared: Arc<Shared>,
}

impl RunScope {
    /// Request a repaint.
    pub fn rerender(&self) {
        self.core.request_render(&self.shared);
    }

    /// End a [`run_until_signal`](Section::run_until_signal) run.
    pub fn signal(&self) {
        self.core.stop.raise();
    }

    /// Leave the screen as the last pass drew it when the run ends, instead
    /// of painting once more after `on_finishing`. Asides made after the
    /// body returned are dropped too.
    pub fn skip_final_render(&self) {
        self.core.skip_final.store(true, Ordering::Release);
    }

    /// Block until [`signal`](Self::signal) is called or the run is
    /// otherwise told to stop.
    pub fn wait_for_signal(&self) {
        self.core.stop.wait();
    }

    /// Paint `block` once, above the section, on the next repaint.
    ///
    /// The block runs right away on the calling thread. Asides appear in
    /// the order they were made and are never repainted.
    pub fn aside(&self, block: impl FnOnce(&mut Renderer)) {
        let mut renderer = Renderer::new();
        block(&mut renderer);
        let buffer: TextBuffer = renderer.finish().with_trailing_newline();
        if self.core.status() != Status::Finished {
            self.shared.send(Command::Aside(buffer));
        }
    }

    /// Call `listener` for every key press while the run lasts.
    pub fn on_key_pressed(&self, listener: impl Fn(&KeyEvent) + Send + Sync + 'static) {
        lock(&self.core.key_listeners).push(Arc::new(listener));
    }

    /// Call `listener` for every input event, unrecognized sequences
    /// included.
    pub fn on_event(&self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        lock(&self.core.event_listeners).push(Arc::new(listener));
    }

    /// Call `listener` when a line is submitted from the input widget.
    pub fn on_input_entered(&self, listener: impl Fn(&InputEntered) + Send + Sync + 'static) {
        lock(&self.core.entered_listeners).push(Arc::new(listener));
    }

    /// Call `callback` after `interval`, and every `interval` after that if
    /// `repeat`. Cancelled when the run ends.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once the session closed or the run ended, or
    /// [`Error::Io`] if the timer thread cannot be started.
    pub fn add_timer(
        &self,
        interval: Duration,
        repeat: bool,
        callback: impl FnMut() + Send + 'static,
    ) -> Result<TimerHandle> {
        if self.shared.is_closed() || self.core.status() == Status::Finished {
            return Err(Error::Closed);
        }
        let handle = timer::spawn(interval, repeat, callback)?;
        lock(&self.core.timers).push(handle.clone());
        Ok(handle)
    }

    /// The text currently in the input widget.
    #[must_use]
    pub fn input_text(&self) -> String {
        self.core.with_line(|line| line.text().to_owned())
    }

    /// Replace the input widget's text and put the cursor at its end.
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.core.with_line(|line| line.set(text));
        self.rerender();
    }
}

impl fmt::Debug for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunScope")
            .field("status", &self.core.status())
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn core() -> SectionCore {
        SectionCore::new(Box::new(|r: &mut Renderer| {
            r.text("x");
        }))
    }

    // ── Status ──────────────────────────────────────────────────────────

    #[test]
    fn status_round_trips_through_u8() {
        for status in [
            Status::Idle,
            Status::RenderRequested,
            Status::Rendering,
            Status::Finished,
        ] {
            assert_eq!(Status::from_u8(status as u8), status);
        }
    }

    #[test]
    fn pass_cycle() {
        let core = core();
        assert!(!core.start_pass());
        assert!(core.transition(Status::Idle, Status::RenderRequested));
        assert!(core.start_pass());
        assert_eq!(core.status(), Status::Rendering);
        assert!(core.end_pass());
        assert_eq!(core.status(), Status::Idle);
    }

    #[test]
    fn request_during_pass_forces_another() {
        let core = core();
        core.transition(Status::Idle, Status::RenderRequested);
        core.start_pass();
        core.transition(Status::Rendering, Status::RenderRequested);
        assert!(!core.end_pass());
        assert!(core.start_pass());
    }

    #[test]
    fn finished_is_final() {
        let core = core();
        core.set_input_enabled(true);
        core.mark_finished();
        assert_eq!(core.status(), Status::Finished);
        assert!(!core.input_enabled());
        assert!(!core.start_pass());
    }

    // ── Failure ─────────────────────────────────────────────────────────

    #[test]
    fn first_failure_wins_and_stops() {
        let core = core();
        core.fail(Error::RenderPanicked("first".into()));
        core.fail(Error::Closed);
        assert!(core.stop.is_raised());
        assert!(matches!(core.take_failure(), Some(Error::RenderPanicked(m)) if m == "first"));
        assert!(core.take_failure().is_none());
    }

    // ── Listeners ───────────────────────────────────────────────────────

    #[test]
    fn panicking_key_listener_does_not_block_others() {
        let core = core();
        let calls = Arc::new(AtomicUsize::new(0));
        lock(&core.key_listeners).push(Arc::new(|_: &KeyEvent| panic!("listener bug")));
        let c = Arc::clone(&calls);
        lock(&core.key_listeners).push(Arc::new(move |_: &KeyEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        core.notify_key(&KeyEvent::new(KeyCode::Enter));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finishing_callbacks_run_once_in_order() {
        let core = core();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let log = Arc::clone(&log);
            lock(&core.finishing).push(Box::new(move || log.lock().unwrap().push(n)));
        }
        core.run_finishing();
        core.run_finishing();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn accepted_input_stops_only_when_awaited() {
        let core = core();
        core.input_accepted();
        assert!(!core.stop.is_raised());
        core.stop_on_entered.store(true, Ordering::Release);
        core.input_accepted();
        assert!(core.stop.is_raised());
    }

    // ── Refused runs ────────────────────────────────────────────────────

    #[test]
    fn refused_run_leaves_no_stop_condition_behind() {
        use crate::config::SessionConfig;
        use std::sync::mpsc;

        let (tx, _rx) = mpsc::channel();
        let shared = Arc::new(Shared::new(SessionConfig::default(), tx));
        shared.begin(&Arc::new(core())).unwrap();

        let section = Section::new(Arc::clone(&shared), |r: &mut Renderer| {
            r.text("y");
        });
        let keyed = section.run_until_key_pressed(&[KeyCode::Char('q')], |_| ());
        assert!(matches!(keyed, Err(Error::SectionActive)));
        let entered = section.run_until_input_entered(|_| ());
        assert!(matches!(entered, Err(Error::SectionActive)));

        assert!(lock(&section.core.key_listeners).is_empty());
        assert!(!section.core.stop_on_entered.load(Ordering::Acquire));
        assert_eq!(section.status(), Status::Idle);
    }

    #[test]
    fn skip_final_render_is_recorded() {
        use crate::config::SessionConfig;
        use std::sync::mpsc;

        let (tx, _rx) = mpsc::channel();
        let shared = Arc::new(Shared::new(SessionConfig::default(), tx));
        let core = Arc::new(core());
        assert!(!core.final_render_skipped());
        let scope = RunScope {
            core: Arc::clone(&core),
            shared,
        };
        scope.skip_final_render();
        assert!(core.final_render_skipped());
    }

    #[test]
    fn input_snapshot_reflects_line() {
        let core = core();
        core.with_line(|line| line.set("abc"));
        assert_eq!(core.input_snapshot(), ("abc".to_owned(), 3));
    }
}
