use ahash::AHashMap as HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tgw_controller_core::{
    DownstreamService, GatewayIdentity, Instance, LeafCertificate, LinkedService,
    RootCertificateSet, TopologySnapshot,
};

pub type SharedStore = Arc<Mutex<TopologyStore>>;

/// Holds all topology state written by the watchers.
///
/// Every write is a plain field update; no I/O happens while the store is
/// locked.
#[derive(Debug, Default)]
pub struct TopologyStore {
    gateway: Option<GatewayIdentity>,
    roots: RootCertificateSet,
    services: HashMap<String, ServiceState>,
}

/// What is known about a tracked service. A resource is `None` until its
/// watcher has fetched it once.
#[derive(Debug)]
struct ServiceState {
    linked: LinkedService,
    instances: Option<Vec<Instance>>,
    leaf: Option<LeafCertificate>,
    intentions: Option<Vec<String>>,
}

// === impl TopologyStore ===

impl TopologyStore {
    pub fn set_gateway(&mut self, gateway: GatewayIdentity) {
        self.gateway = Some(gateway);
    }

    pub fn set_roots(&mut self, roots: RootCertificateSet) {
        self.roots = roots;
    }

    /// Starts tracking a linked service. Returns false if it was already
    /// tracked.
    pub fn track(&mut self, linked: LinkedService) -> bool {
        if self.services.contains_key(&linked.name) {
            return false;
        }
        self.services.insert(
            linked.name.clone(),
            ServiceState {
                linked,
                instances: None,
                leaf: None,
                intentions: None,
            },
        );
        true
    }

    /// Replaces a tracked service's link metadata. Returns true if anything
    /// changed.
    pub fn refresh(&mut self, linked: LinkedService) -> bool {
        match self.services.get_mut(&linked.name) {
            Some(state) if state.linked != linked => {
                state.linked = linked;
                true
            }
            _ => false,
        }
    }

    pub fn evict(&mut self, name: &str) -> bool {
        self.services.remove(name).is_some()
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// The namespace in which a tracked service's instances are registered.
    pub fn namespace(&self, name: &str) -> Option<String> {
        self.services.get(name)?.linked.namespace.clone()
    }

    /// Records a service's instances. Returns false if the service is no
    /// longer tracked.
    pub fn set_instances(&mut self, name: &str, instances: Vec<Instance>) -> bool {
        self.with_service(name, |s| s.instances = Some(instances))
    }

    /// Records a service's leaf certificate. Returns false if the service is
    /// no longer tracked.
    pub fn set_leaf(&mut self, name: &str, leaf: LeafCertificate) -> bool {
        self.with_service(name, |s| s.leaf = Some(leaf))
    }

    /// Records the sources allowed to reach a service. Returns false if the
    /// service is no longer tracked.
    pub fn set_intentions(&mut self, name: &str, sources: Vec<String>) -> bool {
        self.with_service(name, |s| s.intentions = Some(sources))
    }

    fn with_service(&mut self, name: &str, f: impl FnOnce(&mut ServiceState)) -> bool {
        match self.services.get_mut(name) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    /// Copies the current topology.
    ///
    /// Only services whose instances, leaf certificate and intentions have
    /// all been fetched are included.
    pub fn snapshot(&self) -> TopologySnapshot {
        let gateway = self.gateway.clone().unwrap_or_default();
        if self.services.is_empty() {
            return TopologySnapshot::empty(gateway, self.roots.clone());
        }

        let mut services = self
            .services
            .values()
            .filter_map(|state| {
                let instances = state.instances.as_ref()?;
                let leaf = state.leaf.as_ref()?;
                let intentions = state.intentions.as_ref()?;
                Some(DownstreamService {
                    name: state.linked.name.clone(),
                    instances: instances.clone(),
                    intentions: intentions.clone(),
                    leaf: leaf.clone(),
                    proxy_tls: state.linked.proxy_tls.clone(),
                    trust_bundle: self.roots.pems().to_vec(),
                })
            })
            .collect::<Vec<_>>();
        services.sort_by(|a, b| a.name.cmp(&b.name));

        TopologySnapshot {
            gateway,
            roots: self.roots.clone(),
            services,
        }
    }
}
