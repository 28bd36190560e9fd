// SPDX-License-Identifier: MIT
//
// Dispose callbacks — cleanup that must run when a session ends, however it
// ends.
//
// Callbacks run once, in registration order, on a helper thread. The
// caller waits at most the grace period for all of them; a callback that
// hangs is abandoned rather than allowed to keep the process alive.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::error::panic_message;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct DisposeRegistry {
    callbacks: Mutex<Vec<Callback>>,
    ran: AtomicBool,
}

impl DisposeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a callback. Returns `false` if the registry already ran, in
    /// which case the callback is dropped.
    pub(crate) fn register(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.ran.load(Ordering::Acquire) {
            return false;
        }
        callbacks.push(Box::new(callback));
        true
    }

    /// Run every registered callback, waiting at most `grace` for them.
    ///
    /// Only the first call runs anything. Returns whether all callbacks
    /// finished inside the grace period.
    pub(crate) fn run_all(&self, grace: Duration) -> bool {
        let callbacks = {
            let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
            if self.ran.swap(true, Ordering::AcqRel) {
                return true;
            }
            std::mem::take(&mut *callbacks)
        };
        if callbacks.is_empty() {
            return true;
        }

        let count = callbacks.len();
        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("lumen-dispose".into())
            .spawn(move || {
                for callback in callbacks {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                        tracing::warn!(
                            panic = %panic_message(payload.as_ref()),
                            "dispose callback panicked"
                        );
                    }
                }
                done_tx.send(()).ok();
            });
        if let Err(err) = spawned {
            tracing::error!(%err, "could not start dispose thread");
            return false;
        }

        let finished = done_rx.recv_timeout(grace).is_ok();
        if finished {
            tracing::debug!(count, "dispose callbacks finished");
        } else {
            tracing::warn!(count, ?grace, "dispose callbacks exceeded grace period");
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |n: u32| -> Callback {
            let l = Arc::clone(&l);
            Box::new(move || l.lock().unwrap().push(n))
        };
        (log, make)
    }

    #[test]
    fn runs_in_registration_order() {
        let registry = DisposeRegistry::new();
        let (log, make) = recorder();
        for n in 1..=3 {
            registry.register(make(n));
        }
        assert!(registry.run_all(Duration::from_secs(2)));
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn runs_only_once() {
        let registry = DisposeRegistry::new();
        let (log, make) = recorder();
        registry.register(make(1));
        registry.run_all(Duration::from_secs(2));
        registry.run_all(Duration::from_secs(2));
        assert!(!registry.register(make(2)));
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn panicking_callback_is_skipped() {
        let registry = DisposeRegistry::new();
        let (log, make) = recorder();
        registry.register(make(1));
        registry.register(|| panic!("cleanup bug"));
        registry.register(make(3));
        assert!(registry.run_all(Duration::from_secs(2)));
        assert_eq!(*log.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn hanging_callback_is_abandoned_after_grace() {
        let registry = DisposeRegistry::new();
        registry.register(|| thread::sleep(Duration::from_secs(5)));
        let start = std::time::Instant::now();
        assert!(!registry.run_all(Duration::from_millis(20)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
