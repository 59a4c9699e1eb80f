//! A single-slot, latest-wins handoff.
//!
//! The producer never waits: offering a value while an earlier one is still
//! unconsumed replaces it. The consumer always observes the most recent value,
//! though it may never observe some intermediate ones.

use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        closed: AtomicBool::new(false),
        notify: tokio::sync::Notify::new(),
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

#[derive(Debug)]
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    slot: Mutex<Option<T>>,
    closed: AtomicBool,
    notify: tokio::sync::Notify,
}

// === impl Sender ===

impl<T> Sender<T> {
    /// Installs `value` in the slot, returning the unconsumed value it
    /// displaced, if any.
    pub fn offer(&self, value: T) -> Option<T> {
        let displaced = self.shared.slot.lock().replace(value);
        self.shared.notify.notify_one();
        displaced
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

// === impl Receiver ===

impl<T> Receiver<T> {
    /// Waits for a value.
    ///
    /// Returns `None` once the sender has been dropped and the slot is empty.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // The sender may have offered a value just before closing.
                return self.try_recv();
            }
            self.shared.notify.notified().await;
        }
    }

    /// Takes the pending value, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.slot.lock().take()
    }
}
