//! Cross-thread signals: cooperative shutdown and the device reset flag.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative stop request shared by every worker.
///
/// [`is_requested`](Self::is_requested) is a single atomic load, cheap enough
/// for the generator's busy-poll. [`wait_timeout`](Self::wait_timeout) is the
/// only way workers pause, so every wait is bounded and wakes immediately
/// on shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    requested: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl ShutdownSignal {
    /// Create an unsignalled shutdown request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn request(&self) {
        let _guard = self.inner.lock.lock();
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.cond.notify_all();
    }

    /// Non-blocking poll.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout`; returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        while !self.is_requested() {
            if self.inner.cond.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_requested()
    }
}

/// Single-slot "something changed" flag.
///
/// Set from the backend's notification callback on an arbitrary thread,
/// consumed by the render loop. Only the latest signal matters, so repeated
/// sets before a [`take`](Self::take) collapse into one.
#[derive(Debug, Clone, Default)]
pub struct ResetFlag {
    dirty: Arc<AtomicBool>,
}

impl ResetFlag {
    /// Create a clear flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark dirty.
    #[inline]
    pub fn set(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Read and clear.
    #[inline]
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Read without clearing.
    pub fn is_set(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_times_out_without_request() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn request_wakes_waiter_early() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || {
                let start = Instant::now();
                let stopped = signal.wait_timeout(Duration::from_secs(10));
                (stopped, start.elapsed())
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        signal.request();
        let (stopped, elapsed) = waiter.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn wait_after_request_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.request();
        assert!(signal.is_requested());
        assert!(signal.wait_timeout(Duration::from_secs(10)));
    }

    #[test]
    fn reset_flag_collapses_sets() {
        let flag = ResetFlag::new();
        assert!(!flag.take());
        flag.set();
        flag.set();
        assert!(flag.is_set());
        assert!(flag.take());
        assert!(!flag.take());
    }
}
