use crate::metrics::WatchMetrics;
use std::time::Duration;
use tgw_controller_catalog::{self as catalog, Catalog, QueryOptions, Response};
use tgw_controller_core::Latch;
use tokio::time;

/// How long blocking queries wait and how long to back off after a failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    pub wait: Duration,
    pub error_backoff: Duration,
}

/// The outcome of applying a changed value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Update {
    /// The value was written to the store.
    Applied,

    /// The value was not usable; wait for the next change.
    Skipped,

    /// The resource is no longer tracked, so its watch should end.
    Untracked,
}

/// A catalog resource that can be watched with blocking queries.
#[async_trait::async_trait]
pub(crate) trait Resource<C: Catalog>: Send + 'static {
    type Value: Send + 'static;

    const KIND: &'static str;

    async fn fetch(&self, catalog: &C, opts: &QueryOptions) -> catalog::Result<Response<Self::Value>>;

    /// Writes a changed value. Cancellation may interrupt this at any await
    /// point.
    async fn apply(&mut self, value: Self::Value) -> Update;

    /// Called once the watch has ended.
    fn finish(&mut self) {}
}

/// Drives a single resource's blocking-query loop.
pub(crate) struct Watcher<C, R> {
    catalog: C,
    resource: R,
    timing: Timing,
    metrics: WatchMetrics,

    /// Held until the first applied update.
    bootstrap: Option<Latch>,
}

// === impl Watcher ===

impl<C, R> Watcher<C, R>
where
    C: Catalog,
    R: Resource<C>,
{
    pub(crate) fn new(
        catalog: C,
        resource: R,
        timing: Timing,
        metrics: WatchMetrics,
        bootstrap: Option<Latch>,
    ) -> Self {
        Self {
            catalog,
            resource,
            timing,
            metrics,
            bootstrap,
        }
    }

    pub(crate) async fn run(mut self, cancel: drain::Watch) {
        let shutdown = cancel.signaled();
        tokio::pin!(shutdown);

        let mut index = 0;
        loop {
            let opts = QueryOptions::new(index, self.timing.wait);
            let res = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                res = self.resource.fetch(&self.catalog, &opts) => res,
            };

            let rsp = match res {
                Ok(rsp) => rsp,
                Err(error) => {
                    tracing::warn!(%error, index, "Failed to query catalog");
                    self.metrics.errored(R::KIND);
                    if error.index().map_or(true, |i| i == 0 || i < index) && index != 0 {
                        tracing::info!(index, "Resetting watch index");
                        self.metrics.resynced(R::KIND);
                        index = 0;
                    }
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        _ = time::sleep(self.timing.error_backoff) => continue,
                    }
                }
            };

            // An index of 0 would make the next query return immediately.
            let next = rsp.index.max(1);
            if next == index {
                tracing::trace!(index, "Unchanged");
                continue;
            }
            tracing::debug!(index = next, "Changed");
            index = next;

            let update = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                update = self.resource.apply(rsp.value) => update,
            };
            match update {
                Update::Applied => {
                    self.metrics.updated(R::KIND);
                    if let Some(bootstrap) = self.bootstrap.take() {
                        tracing::info!("Ready");
                        bootstrap.count_down();
                    }
                }
                Update::Skipped => {}
                Update::Untracked => break,
            }
        }

        tracing::debug!("Watch ended");
        self.resource.finish();

        // A watch that never applied an update must not hold up bootstrap.
        if let Some(bootstrap) = self.bootstrap.take() {
            bootstrap.count_down();
        }
    }
}
