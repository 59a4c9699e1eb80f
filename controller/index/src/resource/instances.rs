use crate::{
    store::SharedStore,
    watch::{Resource, Update},
};
use tgw_controller_catalog::{self as catalog, Catalog, QueryOptions, Response, ServiceEntry};
use tgw_controller_core::{changes::Notify, Latch};

/// Watches a linked service's registered instances.
pub(crate) struct Instances {
    pub(crate) service: String,
    pub(crate) store: SharedStore,
    pub(crate) notify: Notify,

    /// Released once the service's leaf certificate and intentions are known.
    /// Waited on before the first change is published.
    pub(crate) ready: Option<Latch>,
}

#[async_trait::async_trait]
impl<C: Catalog> Resource<C> for Instances {
    type Value = Vec<ServiceEntry>;

    const KIND: &'static str = "instances";

    async fn fetch(
        &self,
        catalog: &C,
        opts: &QueryOptions,
    ) -> catalog::Result<Response<Self::Value>> {
        // The namespace may move when the link is updated.
        let namespace = self.store.lock().namespace(&self.service);
        catalog
            .service_health(&self.service, namespace.as_deref(), opts)
            .await
    }

    async fn apply(&mut self, entries: Self::Value) -> Update {
        let instances = entries
            .iter()
            .map(ServiceEntry::to_instance)
            .collect::<Vec<_>>();
        if instances.is_empty() {
            tracing::info!("No instances registered");
        } else {
            tracing::debug!(instances = instances.len(), "Instances changed");
        }

        let tracked = self.store.lock().set_instances(&self.service, instances);
        if !tracked {
            return Update::Untracked;
        }

        if let Some(ready) = self.ready.take() {
            tracing::debug!("Waiting for certificate and intentions");
            ready.released().await;
        }
        self.notify.notify();
        Update::Applied
    }
}
