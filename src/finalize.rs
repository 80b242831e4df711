//! At-most-once guard for match finalization.

use core::sync::atomic::{AtomicBool, Ordering};

/// Shared by every path that can end a match (elimination, watchdog, status
/// listener, surrender). Only the first caller of [`Finalizer::try_begin`]
/// gets to run the end-of-match side effects.
#[derive(Debug, Default)]
pub struct Finalizer {
    done: AtomicBool,
}

impl Finalizer {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Returns `true` exactly once, for the first caller.
    pub fn try_begin(&self) -> bool {
        self.done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finalized(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn only_one_of_many_threads_wins() {
        let finalizer = Arc::new(Finalizer::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let finalizer = finalizer.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if finalizer.try_begin() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(finalizer.is_finalized());
    }
}
