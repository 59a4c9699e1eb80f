//! A coalescing change notification.
//!
//! Any number of producers may raise a change; while one is pending, further
//! raises are dropped rather than queued. The single consumer therefore sees at
//! most one outstanding change regardless of how many were raised while it was
//! busy.

use tokio::sync::mpsc;

/// Raises change notifications.
#[derive(Clone, Debug)]
pub struct Notify(mpsc::Sender<()>);

/// Receives coalesced change notifications.
#[derive(Debug)]
pub struct Changes(mpsc::Receiver<()>);

pub fn channel() -> (Notify, Changes) {
    let (tx, rx) = mpsc::channel(1);
    (Notify(tx), Changes(rx))
}

// === impl Notify ===

impl Notify {
    /// Marks a change as pending without waiting.
    ///
    /// Returns true if this call made a change pending and false if one was
    /// already pending (or the consumer is gone).
    pub fn notify(&self) -> bool {
        self.0.try_send(()).is_ok()
    }
}

// === impl Changes ===

impl Changes {
    /// Waits for a pending change, consuming it.
    ///
    /// Returns `None` once every `Notify` handle has been dropped.
    pub async fn changed(&mut self) -> Option<()> {
        self.0.recv().await
    }

    /// Consumes a pending change, if any, without waiting.
    pub fn clear(&mut self) -> bool {
        self.0.try_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn coalesces_pending_changes() {
        let (notify, mut changes) = channel();

        assert!(notify.notify());
        for _ in 0..10 {
            assert!(!notify.notify());
        }

        let mut changed = task::spawn(changes.changed());
        assert_ready_eq!(changed.poll(), Some(()));
        drop(changed);

        let mut changed = task::spawn(changes.changed());
        assert_pending!(changed.poll());

        assert!(notify.notify());
        assert!(changed.is_woken());
        assert_ready_eq!(changed.poll(), Some(()));
    }

    #[test]
    fn clear_discards_a_pending_change() {
        let (notify, mut changes) = channel();
        assert!(!changes.clear());
        notify.notify();
        assert!(changes.clear());
        assert!(!changes.clear());
    }

    #[test]
    fn closes_when_notifiers_drop() {
        let (notify, mut changes) = channel();
        let other = notify.clone();
        drop(notify);
        other.notify();
        drop(other);

        let mut changed = task::spawn(changes.changed());
        assert_ready_eq!(changed.poll(), Some(()));
        drop(changed);

        let mut changed = task::spawn(changes.changed());
        assert_ready_eq!(changed.poll(), None);
    }
}
