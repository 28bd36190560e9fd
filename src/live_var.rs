// SPDX-License-Identifier: MIT
//
// LiveVar — observable state that render blocks read.
//
// A LiveVar is a shared cell plus a listener list. Writing a different
// value notifies every listener; a session-created var has one listener
// from the start that asks the session for a repaint. Render blocks read
// the latest value with `get` and never see a torn one.
//
// The value lives in an `ArcSwap`. Readers load the `Arc` without locking;
// writers build the next value from a snapshot, then compare-and-swap it in
// only if the slot still holds that snapshot, retrying otherwise. Nothing
// blocks: a render never waits on a writer, and a writer never waits on a
// render. Listeners run after the swap, on the writing thread.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

use crate::error::panic_message;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifies a listener for [`LiveVar::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An observable value. Cloning yields another handle to the same cell.
pub struct LiveVar<T> {
    inner: Arc<VarInner<T>>,
}

struct VarInner<T> {
    value: ArcSwap<T>,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

fn lock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: PartialEq + Send + Sync + 'static> LiveVar<T> {
    /// A var with no listeners.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(VarInner {
                value: ArcSwap::from_pointee(value),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// The current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.snapshot())
    }

    /// The current value without cloning it.
    pub fn snapshot(&self) -> Arc<T> {
        self.inner.value.load_full()
    }

    /// Store `value`. Listeners run only if it differs from the current
    /// value. Returns whether it did.
    pub fn set(&self, value: T) -> bool {
        let next = Arc::new(value);
        loop {
            let current = self.snapshot();
            if *current == *next {
                return false;
            }
            if self.swap(&current, &next) {
                self.notify(&next);
                return true;
            }
        }
    }

    /// Replace the value with `f(current)` without losing concurrent
    /// writes. Listeners run only if the result differs. Returns whether it
    /// did.
    ///
    /// `f` may run more than once when other threads write at the same
    /// time, so it should be free of side effects.
    pub fn update(&self, mut f: impl FnMut(&T) -> T) -> bool {
        loop {
            let current = self.snapshot();
            let next = f(&current);
            if next == *current {
                return false;
            }
            let next = Arc::new(next);
            if self.swap(&current, &next) {
                self.notify(&next);
                return true;
            }
            tracing::trace!("live var update raced, retrying");
        }
    }

    /// Install `next` if the slot still holds `current`.
    fn swap(&self, current: &Arc<T>, next: &Arc<T>) -> bool {
        let previous = self.inner.value.compare_and_swap(current, Arc::clone(next));
        Arc::ptr_eq(&*previous, current)
    }

    /// Register `listener` to run after every change, with the new value.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, value: &T) {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener<T>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
                tracing::warn!(
                    panic = %panic_message(payload.as_ref()),
                    "live var listener panicked"
                );
            }
        }
    }
}

impl<T> Clone for LiveVar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LiveVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.inner.value.load();
        f.debug_tuple("LiveVar").field(&**value).finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counter(var: &LiveVar<i32>) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        var.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        calls
    }

    // ── Reads and writes ────────────────────────────────────────────────

    #[test]
    fn get_returns_latest() {
        let var = LiveVar::new(1);
        var.set(2);
        assert_eq!(var.get(), 2);
        assert_eq!(*var.snapshot(), 2);
    }

    #[test]
    fn clones_share_the_cell() {
        let a = LiveVar::new(String::from("x"));
        let b = a.clone();
        b.set("y".into());
        assert_eq!(a.get(), "y");
    }

    // ── Notification ────────────────────────────────────────────────────

    #[test]
    fn change_notifies_with_new_value() {
        let var = LiveVar::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        var.subscribe(move |v| s.lock().unwrap().push(*v));
        assert!(var.set(5));
        assert!(var.update(|v| v + 1));
        assert_eq!(*seen.lock().unwrap(), vec![5, 6]);
    }

    #[test]
    fn equal_value_does_not_notify() {
        let var = LiveVar::new(3);
        let calls = counter(&var);
        assert!(!var.set(3));
        assert!(!var.update(|v| *v));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_notification() {
        let var = LiveVar::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let id = var.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        var.set(1);
        assert!(var.unsubscribe(id));
        assert!(!var.unsubscribe(id));
        var.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let var = LiveVar::new(0);
        var.subscribe(|_| panic!("listener bug"));
        let calls = counter(&var);
        var.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(var.get(), 1);
    }

    #[test]
    fn listener_may_read_the_var() {
        let var = LiveVar::new(0);
        let inner = var.clone();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        var.subscribe(move |_| *s.lock().unwrap() = Some(inner.get()));
        var.set(9);
        assert_eq!(*seen.lock().unwrap(), Some(9));
    }

    #[test]
    fn debug_shows_value() {
        assert_eq!(format!("{:?}", LiveVar::new(4)), "LiveVar(4)");
    }

    // ── Concurrency ─────────────────────────────────────────────────────

    #[test]
    fn swap_fails_against_stale_snapshot() {
        let var = LiveVar::new(1);
        let stale = var.snapshot();
        var.set(2);
        assert!(!var.swap(&stale, &Arc::new(3)));
        assert_eq!(var.get(), 2);
        let fresh = var.snapshot();
        assert!(var.swap(&fresh, &Arc::new(3)));
        assert_eq!(var.get(), 3);
    }

    #[test]
    fn reads_proceed_while_a_listener_runs() {
        let var = LiveVar::new(0);
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release = Mutex::new(release_rx);
        var.subscribe(move |_| {
            entered_tx.send(()).ok();
            release.lock().unwrap().recv().ok();
        });
        let writer = {
            let var = var.clone();
            thread::spawn(move || var.set(1))
        };
        entered_rx.recv().unwrap();
        // The writer is parked inside its listener; reads still succeed.
        assert_eq!(var.get(), 1);
        release_tx.send(()).unwrap();
        assert!(writer.join().unwrap());
    }

    #[test]
    fn concurrent_updates_lose_nothing() {
        let var = LiveVar::new(0u32);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let var = var.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        var.update(|v| v + 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(var.get(), 4000);
    }
}
