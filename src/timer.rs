// SPDX-License-Identifier: MIT
//
// Timers — callbacks that fire on an interval from their own thread.
//
// Each timer is one `lumen-timer` thread sleeping on a cancel latch. A
// cancelled timer wakes at once and exits; it never fires again. Sections
// cancel the timers they own when they finish.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::panic_message;
use crate::signal::Signal;

/// Handle to a running timer. Dropping it does not cancel the timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancel: Arc<Signal>,
}

impl TimerHandle {
    /// Stop the timer. Idempotent.
    pub fn cancel(&self) {
        self.cancel.raise();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_raised()
    }
}

/// Start a timer that calls `callback` after `interval`, and again every
/// `interval` after that if `repeat`.
pub(crate) fn spawn(
    interval: Duration,
    repeat: bool,
    mut callback: impl FnMut() + Send + 'static,
) -> io::Result<TimerHandle> {
    let cancel = Arc::new(Signal::new());
    let latch = Arc::clone(&cancel);
    thread::Builder::new()
        .name("lumen-timer".into())
        .spawn(move || {
            while !latch.wait_timeout(interval) {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut callback)) {
                    tracing::warn!(
                        panic = %panic_message(payload.as_ref()),
                        "timer callback panicked"
                    );
                }
                if !repeat {
                    break;
                }
            }
            tracing::trace!("timer stopped");
        })?;
    Ok(TimerHandle { cancel })
}
