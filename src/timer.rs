//! Independent, cancellable session timers.
//!
//! Each timer owns its own spawned sleep task rather than sharing a single
//! deadline with the rest of the session. Restarting is start-cancel-start:
//! [`Timer::start`] bumps a generation counter before spawning a fresh sleep,
//! and an expiring task checks its captured generation against the live one
//! before invoking the callback. A timer cancelled (or restarted) between its
//! sleep completing and its callback running therefore fires nothing — the
//! expiry is a stale no-op, not a spurious fatal error.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A timer expiry callback. Boxed to let T0/T1/T3 share one `Timer` type
/// despite closing over different session state.
pub type TimerCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A single named, restartable timer.
///
/// Grounded on the session timer's `start`/`cancel`/`reschedule` shape, with
/// an added generation counter: the reference timer relies solely on
/// cancelling its sleep task, which races against a callback already in
/// flight when a timer is restarted very close to its own expiry. Tagging
/// every armed sleep with a generation and checking it before the callback
/// runs closes that race without changing the external start/cancel/
/// reschedule contract.
pub struct Timer {
    name: &'static str,
    timeout: Duration,
    callback: TimerCallback,
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Create a new timer. It is not armed until [`Timer::start`] is called.
    pub fn new(name: &'static str, timeout: Duration, callback: TimerCallback) -> Self {
        Self {
            name,
            timeout,
            callback,
            generation: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Timer name, for logging.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// (Re)arm the timer: cancels any in-flight sleep and spawns a fresh one.
    /// A zero timeout leaves the timer disarmed, matching the reference
    /// timer's "non-positive timeout never fires" behavior.
    pub fn start(&mut self) {
        self.cancel();
        if self.timeout.is_zero() {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let gen_handle = Arc::clone(&self.generation);
        let timeout = self.timeout;
        let callback = Arc::clone(&self.callback);

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if gen_handle.load(Ordering::SeqCst) == generation {
                (callback)().await;
            }
        }));
    }

    /// Cancel the timer. Idempotent; safe to call on a timer that was never
    /// started.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Change the timeout; if the timer is currently armed, restart it with
    /// the new duration.
    pub fn reschedule(&mut self, timeout: Duration) {
        self.timeout = timeout;
        if self.handle.is_some() {
            self.start();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
