use crate::{
    metrics::WatchMetrics,
    resource::{Instances, Intentions, Leaf},
    store::SharedStore,
    watch::{Resource, Timing, Update, Watcher},
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use tgw_controller_catalog::{self as catalog, Catalog, GatewayService, QueryOptions, Response};
use tgw_controller_core::{changes::Notify, Latch, LinkedService};
use tracing::{info_span, Instrument};

/// Watches the gateway's linked services, starting and stopping per-service
/// watches as services are linked and unlinked.
pub(crate) struct Reconciler<C> {
    gateway: String,
    catalog: C,
    store: SharedStore,
    notify: Notify,
    timing: Timing,
    metrics: WatchMetrics,

    /// The global bootstrap gate. Each service linked before it is released
    /// extends it by one count per service watch.
    bootstrap: Latch,

    /// Whether a linked-service list has been accepted yet.
    initialized: bool,

    services: HashMap<String, drain::Signal>,
}

// === impl Reconciler ===

impl<C: Catalog> Reconciler<C> {
    pub(crate) fn new(
        gateway: String,
        catalog: C,
        store: SharedStore,
        notify: Notify,
        timing: Timing,
        metrics: WatchMetrics,
        bootstrap: Latch,
    ) -> Self {
        Self {
            gateway,
            catalog,
            store,
            notify,
            timing,
            metrics,
            bootstrap,
            initialized: false,
            services: HashMap::default(),
        }
    }

    fn start(&mut self, linked: LinkedService) {
        let name = linked.name.clone();
        tracing::info!(service = %name, "Watching service");

        self.store.lock().track(linked);
        let (signal, cancel) = drain::channel();
        self.services.insert(name.clone(), signal);

        let ready = Latch::new(2);
        let bootstrap = self.bootstrap.extend(3).then(|| self.bootstrap.clone());

        let instances = Instances {
            service: name.clone(),
            store: self.store.clone(),
            notify: self.notify.clone(),
            ready: Some(ready.clone()),
        };
        tokio::spawn(
            Watcher::new(
                self.catalog.clone(),
                instances,
                self.timing,
                self.metrics.clone(),
                bootstrap.clone(),
            )
            .run(cancel.clone())
            .instrument(info_span!("instances", service = %name)),
        );

        let leaf = Leaf {
            service: name.clone(),
            store: self.store.clone(),
            notify: self.notify.clone(),
            ready: Some(ready.clone()),
        };
        tokio::spawn(
            Watcher::new(
                self.catalog.clone(),
                leaf,
                self.timing,
                self.metrics.clone(),
                bootstrap.clone(),
            )
            .run(cancel.clone())
            .instrument(info_span!("leaf", service = %name)),
        );

        let intentions = Intentions {
            service: name.clone(),
            store: self.store.clone(),
            notify: self.notify.clone(),
            ready: Some(ready),
        };
        tokio::spawn(
            Watcher::new(
                self.catalog.clone(),
                intentions,
                self.timing,
                self.metrics.clone(),
                bootstrap,
            )
            .run(cancel)
            .instrument(info_span!("intentions", service = %name)),
        );
    }

    fn stop(&mut self, name: &str) {
        let Some(signal) = self.services.remove(name) else {
            return;
        };
        tracing::info!(service = %name, "Removing service");
        tokio::spawn(signal.drain());
        self.store.lock().evict(name);
    }
}

#[async_trait::async_trait]
impl<C: Catalog> Resource<C> for Reconciler<C> {
    type Value = Vec<GatewayService>;

    const KIND: &'static str = "services";

    async fn fetch(
        &self,
        catalog: &C,
        opts: &QueryOptions,
    ) -> catalog::Result<Response<Self::Value>> {
        catalog.gateway_services(&self.gateway, opts).await
    }

    async fn apply(&mut self, services: Self::Value) -> Update {
        if !self.initialized && services.is_empty() {
            tracing::info!("No services linked to gateway");
            return Update::Skipped;
        }
        self.initialized = true;

        let linked = services
            .iter()
            .map(GatewayService::to_linked_service)
            .collect::<Vec<_>>();
        tracing::info!(services = linked.len(), "Linked services changed");

        let mut changed = false;

        let keep = linked
            .iter()
            .map(|s| s.name.as_str())
            .collect::<HashSet<_>>();
        let removed = self
            .services
            .keys()
            .filter(|name| !keep.contains(name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        for name in removed {
            self.stop(&name);
            changed = true;
        }

        for svc in linked {
            if self.services.contains_key(&svc.name) {
                changed |= self.store.lock().refresh(svc);
            } else {
                self.start(svc);
            }
        }

        self.metrics.set_services(self.services.len());
        if changed {
            self.notify.notify();
        }
        Update::Applied
    }

    fn finish(&mut self) {
        let names = self.services.keys().cloned().collect::<Vec<_>>();
        for name in names {
            self.stop(&name);
        }
    }
}
