//! Terminating gateway topology index
//!
//! The index watches the catalog for everything needed to describe the
//! gateway's topology:
//!
//! - The gateway's own service registration provides the address and port on
//!   which it accepts connections.
//! - The gateway's linked services determine which downstream services are
//!   tracked. Each linked service is watched for its instances, its leaf
//!   certificate and the intentions that allow sources to reach it.
//! - The mesh's trusted roots are shared by every service's trust chain.
//!
//! ```text
//! [ Gateway ] [ Roots ] [ Linked services ] -> [ Instances ] [ Leaf ] [ Intentions ]
//!      \          |               |                  |          |          /
//!       `---------+---------------+--> [ TopologyStore ] <-----+---------'
//! ```
//!
//! Every watch is a blocking query loop. Results are written into a shared
//! store and a coalesced notification is raised; the [`Handle`] turns those
//! notifications into [`TopologySnapshot`]s. No snapshot is produced until
//! every watch (including those of services linked during startup) has
//! completed its first fetch, and a service is never included before its
//! certificate and intentions are known.
//!
//! [`TopologySnapshot`]: tgw_controller_core::TopologySnapshot

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod handle;
mod metrics;
mod reconcile;
mod resource;
mod store;
mod watch;


pub use self::{
    handle::Handle,
    metrics::WatchMetrics,
    store::{SharedStore, TopologyStore},
    watch::Timing,
};
use self::{reconcile::Reconciler, watch::Watcher};
use tgw_controller_catalog::Catalog;
use tgw_controller_core::{changes, Latch};
use tracing::{info_span, Instrument};

/// Identifies the gateway being watched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewaySettings {
    pub name: String,

    /// The namespace in which the gateway itself is registered.
    pub namespace: Option<String>,
}

/// Spawns the gateway, linked-service and root watches, returning a handle
/// that yields snapshots of the resulting topology.
///
/// The watches run until `shutdown` is signaled.
pub fn spawn<C: Catalog>(
    catalog: C,
    gateway: GatewaySettings,
    timing: Timing,
    metrics: WatchMetrics,
    shutdown: drain::Watch,
) -> Handle {
    let store = SharedStore::default();
    let (notify, changes) = changes::channel();

    // Gateway, linked services and roots. Services found by the first
    // linked-service update extend this.
    let bootstrap = Latch::new(3);

    let gw = resource::Gateway {
        name: gateway.name.clone(),
        namespace: gateway.namespace.clone(),
        store: store.clone(),
        notify: notify.clone(),
    };
    tokio::spawn(
        Watcher::new(
            catalog.clone(),
            gw,
            timing,
            metrics.clone(),
            Some(bootstrap.clone()),
        )
        .run(shutdown.clone())
        .instrument(info_span!("gateway", name = %gateway.name)),
    );

    let reconciler = Reconciler::new(
        gateway.name.clone(),
        catalog.clone(),
        store.clone(),
        notify.clone(),
        timing,
        metrics.clone(),
        bootstrap.clone(),
    );
    tokio::spawn(
        Watcher::new(
            catalog.clone(),
            reconciler,
            timing,
            metrics.clone(),
            Some(bootstrap.clone()),
        )
        .run(shutdown.clone())
        .instrument(info_span!("services", gateway = %gateway.name)),
    );

    let roots = resource::Roots {
        store: store.clone(),
        notify,
    };
    tokio::spawn(
        Watcher::new(catalog, roots, timing, metrics, Some(bootstrap.clone()))
            .run(shutdown)
            .instrument(info_span!("roots")),
    );

    Handle::new(store, bootstrap, changes)
}
