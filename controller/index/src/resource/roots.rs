use crate::{
    store::SharedStore,
    watch::{Resource, Update},
};
use tgw_controller_catalog::{self as catalog, CaRoots, Catalog, QueryOptions, Response};
use tgw_controller_core::{changes::Notify, RootCertificateSet};

/// Watches the mesh's trusted roots.
pub(crate) struct Roots {
    pub(crate) store: SharedStore,
    pub(crate) notify: Notify,
}

#[async_trait::async_trait]
impl<C: Catalog> Resource<C> for Roots {
    type Value = CaRoots;

    const KIND: &'static str = "roots";

    async fn fetch(
        &self,
        catalog: &C,
        opts: &QueryOptions,
    ) -> catalog::Result<Response<Self::Value>> {
        catalog.ca_roots(opts).await
    }

    async fn apply(&mut self, roots: Self::Value) -> Update {
        tracing::info!(active_root = %roots.active_root_id, roots = roots.roots.len(), "CA roots changed");
        let roots = RootCertificateSet::new(roots.active_root_id.clone(), roots.pems());
        self.store.lock().set_roots(roots);
        self.notify.notify();
        Update::Applied
    }
}
