// One-shot completion signal shared by the session and its render pipeline

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

const PENDING: u8 = 0;
const FIRING: u8 = 1;
const FIRED: u8 = 2;

/// Signal that fires at most once and can be awaited from any thread.
///
/// `fire` may race from several threads (an explicit stop against the
/// pipeline's natural end); exactly one of them performs the
/// `PENDING -> FIRING -> FIRED` transition.
pub struct Completion {
    state: AtomicU8,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Fire the signal. Returns true only for the call that fired it.
    pub fn fire(&self) -> bool {
        if self
            .state
            .compare_exchange(PENDING, FIRING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // Waiters check the state under this lock, so the wakeup cannot be lost
        let _guard = self.lock.lock();
        self.state.store(FIRED, Ordering::Release);
        self.cond.notify_all();
        true
    }

    /// Whether some call has already claimed the signal
    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }

    /// Block until the signal has fired
    pub fn wait(&self) {
        let mut guard = self.lock.lock();
        while self.state.load(Ordering::Acquire) != FIRED {
            self.cond.wait(&mut guard);
        }
    }

    /// Block until the signal fired or `timeout` elapsed. Returns whether it fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        while self.state.load(Ordering::Acquire) != FIRED {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return self.state.load(Ordering::Acquire) == FIRED;
            }
        }
        true
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fires_once() {
        let done = Completion::new();
        assert!(!done.is_fired());
        assert!(done.fire());
        assert!(!done.fire());
        assert!(done.is_fired());
        done.wait();
    }

    #[test]
    fn test_concurrent_fire_single_winner() {
        let done = Arc::new(Completion::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let done = done.clone();
                let winners = winners.clone();
                thread::spawn(move || {
                    if done.fire() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_wakes_on_fire() {
        let done = Arc::new(Completion::new());
        let waiter = {
            let done = done.clone();
            thread::spawn(move || done.wait())
        };

        thread::sleep(Duration::from_millis(20));
        done.fire();
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let done = Completion::new();
        assert!(!done.wait_timeout(Duration::from_millis(10)));
        done.fire();
        assert!(done.wait_timeout(Duration::from_millis(10)));
    }
}
