use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot readiness flag.
///
/// Starts unset and flips to set at most once, the first time [`set`] is
/// called. Observers on any thread see the transition eventually; there is no
/// ordering guarantee relative to the call that triggered it beyond that.
///
/// [`set`]: CreatedSignal::set
pub struct CreatedSignal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl CreatedSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Flips the signal. Idempotent: only the first call notifies waiters.
    pub fn set(&self) {
        let mut set = self.flag.lock();
        if !*set {
            *set = true;
            self.cond.notify_all();
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.flag.lock()
    }

    /// Blocks until the signal is set or the timeout elapses. Returns the
    /// signal state at return time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.flag.lock();
        while !*set {
            if self.cond.wait_until(&mut set, deadline).timed_out() {
                break;
            }
        }
        *set
    }
}

impl Default for CreatedSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_unset() {
        let signal = CreatedSignal::new();
        assert!(!signal.is_set());
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_set_is_idempotent() {
        let signal = CreatedSignal::new();
        signal.set();
        signal.set();
        assert!(signal.is_set());
        assert!(signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_cross_thread_wait() {
        let signal = Arc::new(CreatedSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)))
        };
        signal.set();
        assert!(waiter.join().unwrap());
    }
}
