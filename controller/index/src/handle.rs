use crate::store::SharedStore;
use tgw_controller_core::{changes::Changes, Latch, TopologySnapshot};

/// Yields topology snapshots as the catalog changes.
///
/// The first snapshot is produced once every watch has completed its initial
/// fetch; each later one follows a coalesced change notification, so a burst
/// of changes while the consumer is busy produces at most one more snapshot.
#[derive(Debug)]
pub struct Handle {
    store: SharedStore,
    bootstrap: Latch,
    changes: Changes,
    bootstrapped: bool,
}

impl Handle {
    pub(crate) fn new(store: SharedStore, bootstrap: Latch, changes: Changes) -> Self {
        Self {
            store,
            bootstrap,
            changes,
            bootstrapped: false,
        }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once all watches have ended.
    pub async fn next(&mut self) -> Option<TopologySnapshot> {
        if self.bootstrapped {
            self.changes.changed().await?;
        } else {
            self.bootstrap.released().await;
            // Changes raised during bootstrap are covered by this snapshot.
            self.changes.clear();
            self.bootstrapped = true;
            tracing::info!("Bootstrap complete");
        }
        Some(self.store.lock().snapshot())
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrap.is_released()
    }
}
