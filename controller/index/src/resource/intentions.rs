use crate::{
    store::SharedStore,
    watch::{Resource, Update},
};
use tgw_controller_catalog::{self as catalog, Catalog, Intention, QueryOptions, Response};
use tgw_controller_core::{changes::Notify, Latch};

/// Watches the intentions whose destination is a linked service.
pub(crate) struct Intentions {
    pub(crate) service: String,
    pub(crate) store: SharedStore,
    pub(crate) notify: Notify,

    /// Counted down by the first update instead of publishing a change.
    pub(crate) ready: Option<Latch>,
}

#[async_trait::async_trait]
impl<C: Catalog> Resource<C> for Intentions {
    type Value = Vec<Intention>;

    const KIND: &'static str = "intentions";

    async fn fetch(
        &self,
        catalog: &C,
        opts: &QueryOptions,
    ) -> catalog::Result<Response<Self::Value>> {
        catalog.intentions(&self.service, opts).await
    }

    async fn apply(&mut self, intentions: Self::Value) -> Update {
        let sources = Intention::allowed_sources(&intentions);
        tracing::info!(intentions = intentions.len(), allowed = sources.len(), "Intentions changed");
        let tracked = self.store.lock().set_intentions(&self.service, sources);
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
