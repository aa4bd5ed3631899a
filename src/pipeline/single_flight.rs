//! Single-flight lock guarding the dispatch operation.
//!
//! Only one dispatch may run at a time per process. The lock has
//! try-acquire/release semantics: a concurrent trigger observes the lock
//! held and returns immediately instead of blocking or queueing. It is a
//! plain value injected into the [`Dispatcher`](crate::pipeline::Dispatcher)
//! so tests can hold the lock and observe the rejection path
//! deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// SingleFlight
// ---------------------------------------------------------------------------

/// Cloneable try-acquire/release lock. All clones share one flag.
#[derive(Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

/// RAII guard; releases the lock on drop.
pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock if it is free. Never blocks.
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| FlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_succeeds_when_free() {
        let lock = SingleFlight::new();
        assert!(!lock.is_held());
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_held());
    }

    #[test]
    fn second_acquire_is_rejected_while_held() {
        let lock = SingleFlight::new();
        let _guard = lock.try_acquire().expect("first acquire");
        assert!(lock.try_acquire().is_none());
    }

    #[test]
    fn drop_releases_the_lock() {
        let lock = SingleFlight::new();
        {
            let _guard = lock.try_acquire().expect("acquire");
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn clones_share_the_flag() {
        let lock = SingleFlight::new();
        let clone = lock.clone();
        let _guard = lock.try_acquire().expect("acquire");
        assert!(clone.is_held());
        assert!(clone.try_acquire().is_none());
    }
}
