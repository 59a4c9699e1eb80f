//! A one-shot countdown gate.
//!
//! A `Latch` starts with a target count and is released exactly once, when the
//! count reaches zero. While it is still held, the target may be extended (e.g.
//! as new services are discovered during bootstrap); once released it can be
//! neither extended nor re-armed.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct Latch(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    remaining: AtomicUsize,
    released: watch::Sender<bool>,
}

// === impl Latch ===

impl Latch {
    pub fn new(count: usize) -> Self {
        let (released, _) = watch::channel(count == 0);
        Self(Arc::new(Inner {
            remaining: AtomicUsize::new(count),
            released,
        }))
    }

    /// Raises the target by `n`.
    ///
    /// Returns false, leaving the latch untouched, if it has already been
    /// released.
    pub fn extend(&self, n: usize) -> bool {
        let mut cur = self.0.remaining.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                return false;
            }
            match self.0.remaining.compare_exchange_weak(
                cur,
                cur + n,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Satisfies one count, releasing the latch if it was the last one.
    ///
    /// Has no effect once the latch is released.
    pub fn count_down(&self) {
        let mut cur = self.0.remaining.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                return;
            }
            match self.0.remaining.compare_exchange_weak(
                cur,
                cur - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }

        if cur == 1 {
            self.0.released.send_replace(true);
        }
    }

    pub fn remaining(&self) -> usize {
        self.0.remaining.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        *self.0.released.borrow()
    }

    /// Waits for the latch to be released.
    pub async fn released(&self) {
        let mut rx = self.0.released.subscribe();
        // The sender is owned by `self`, so the channel cannot close while we
        // wait on it.
        let _ = rx.wait_for(|released| *released).await;
    }
}
