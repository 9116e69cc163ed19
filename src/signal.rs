//! # Abort signal: one-shot cancellation token owned by a task.
//!
//! [`AbortSignal`] is handed to every run function. It combines:
//! - an `aborted` flag that goes `false → true` at most once;
//! - an awaitable [`aborted`](AbortSignal::aborted) future (backed by a
//!   [`CancellationToken`]), used by the runner to race the task;
//! - one-shot observers registered with [`on_abort`](AbortSignal::on_abort),
//!   used by run functions to tear down in-flight work (clear timers, close sockets).
//!
//! ## Rules
//! - [`fire`](AbortSignal::fire) is idempotent: only the first call notifies.
//! - An observer runs **at most once**: immediately if already aborted, otherwise on the next `fire`.
//! - Observers run outside the internal lock, so they may call back into the signal.
//! - A panicking observer is contained: the remaining observers still run and `fire` returns normally.
//! - [`clear_observers`](AbortSignal::clear_observers) drops pending registrations
//!   (the runner does it on `stats()` and `destroy()`).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use stagevisor::AbortSignal;
//!
//! let signal = AbortSignal::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let h = hits.clone();
//! signal.on_abort(move || { h.fetch_add(1, Ordering::SeqCst); });
//!
//! assert!(signal.fire());
//! assert!(!signal.fire());
//! assert!(signal.is_aborted());
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type Observer = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Observers {
    fired: bool,
    pending: Vec<Observer>,
}

struct Inner {
    token: CancellationToken,
    observers: Mutex<Observers>,
}

/// One-shot abort signal.
///
/// Cheap to clone: clones observe the same underlying state.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    /// Creates a signal in the non-aborted state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    /// Aborts the signal and notifies every pending observer.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// signal was already aborted (no-op).
    pub fn fire(&self) -> bool {
        let pending = {
            let mut obs = self.inner.observers.lock();
            if obs.fired {
                return false;
            }
            obs.fired = true;
            std::mem::take(&mut obs.pending)
        };
        self.inner.token.cancel();

        for observer in pending {
            let _ = panic::catch_unwind(AssertUnwindSafe(observer));
        }
        true
    }

    /// Returns `true` once the signal has been fired.
    pub fn is_aborted(&self) -> bool {
        self.inner.observers.lock().fired
    }

    /// Registers a one-shot observer.
    ///
    /// If the signal is already aborted the observer runs immediately on the caller's thread.
    pub fn on_abort<F>(&self, observer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut obs = self.inner.observers.lock();
            if !obs.fired {
                obs.pending.push(Box::new(observer));
                return;
            }
        }
        observer();
    }

    /// Completes when the signal is fired (immediately if already aborted).
    pub async fn aborted(&self) {
        self.inner.token.cancelled().await
    }

    /// Number of observers still waiting for an abort.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().pending.len()
    }

    /// Drops every pending observer without invoking it.
    pub fn clear_observers(&self) {
        self.inner.observers.lock().pending.clear();
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obs = self.inner.observers.lock();
        f.debug_struct("AbortSignal")
            .field("aborted", &obs.fired)
            .field("observers", &obs.pending.len())
            .finish()
    }
}
