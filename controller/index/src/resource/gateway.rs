use crate::{
    store::SharedStore,
    watch::{Resource, Update},
};
use tgw_controller_catalog::{self as catalog, Catalog, QueryOptions, Response, ServiceEntry};
use tgw_controller_core::changes::Notify;

/// Watches the gateway's own service registration.
pub(crate) struct Gateway {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) store: SharedStore,
    pub(crate) notify: Notify,
}

#[async_trait::async_trait]
impl<C: Catalog> Resource<C> for Gateway {
    type Value = Vec<ServiceEntry>;

    const KIND: &'static str = "gateway";

    async fn fetch(
        &self,
        catalog: &C,
        opts: &QueryOptions,
    ) -> catalog::Result<Response<Self::Value>> {
        catalog
            .service_health(&self.name, self.namespace.as_deref(), opts)
            .await
    }

    async fn apply(&mut self, entries: Self::Value) -> Update {
        let entry = match entries.as_slice() {
            [entry] => entry,
            [] => {
                tracing::info!("No service registration found for gateway");
                return Update::Skipped;
            }
            entries => {
                tracing::error!(
                    registrations = entries.len(),
                    "Too many service registrations found for gateway"
                );
                return Update::Skipped;
            }
        };

        let gateway = entry.to_gateway_identity();
        tracing::info!(id = %gateway.id, address = %gateway.address, port = gateway.port, "Gateway registration changed");
        self.store.lock().set_gateway(gateway);
        self.notify.notify();
        Update::Applied
    }
}
