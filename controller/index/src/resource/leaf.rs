use crate::{
    store::SharedStore,
    watch::{Resource, Update},
};
use tgw_controller_catalog::{self as catalog, Catalog, LeafCert, QueryOptions, Response};
use tgw_controller_core::{changes::Notify, Latch};

/// Watches a linked service's leaf certificate.
pub(crate) struct Leaf {
    pub(crate) service: String,
    pub(crate) store: SharedStore,
    pub(crate) notify: Notify,

    /// Counted down by the first update instead of publishing a change.
    pub(crate) ready: Option<Latch>,
}

#[async_trait::async_trait]
impl<C: Catalog> Resource<C> for Leaf {
    type Value = LeafCert;

    const KIND: &'static str = "leaf";

    async fn fetch(
        &self,
        catalog: &C,
        opts: &QueryOptions,
    ) -> catalog::Result<Response<Self::Value>> {
        catalog.leaf_certificate(&self.service, opts).await
    }

    async fn apply(&mut self, leaf: Self::Value) -> Update {
        tracing::info!(
            serial = %leaf.serial_number,
            valid_after = %leaf.valid_after,
            valid_before = %leaf.valid_before,
            "Leaf certificate changed"
        );
        let tracked = self
            .store
            .lock()
            .set_leaf(&self.service, leaf.to_leaf_certificate());
        if !tracked {
            return Update::Untracked;
        }

        match self.ready.take() {
            Some(ready) => ready.count_down(),
            None => {
                self.notify.notify();
            }
        }
        Update::Applied
    }
}
