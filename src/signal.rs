// SPDX-License-Identifier: MIT
//
// A one-shot latch that threads can block on.
//
// `raise` flips it once and wakes every waiter; waiting on a raised latch
// returns at once. Runs use one to wait for their end condition, timers use
// one as an interruptible sleep.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub(crate) struct Signal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn raise(&self) {
        *self.lock() = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_raised(&self) -> bool {
        *self.lock()
    }

    /// Block until raised.
    pub(crate) fn wait(&self) {
        let mut raised = self.lock();
        while !*raised {
            raised = self.cond.wait(raised).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until raised or `timeout` elapses. Returns whether it was raised.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut raised = self.lock();
        while !*raised {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            raised = self
                .cond
                .wait_timeout(raised, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}
