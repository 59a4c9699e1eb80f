use crate::{DownstreamService, GatewayIdentity, RootCertificateSet};

/// An immutable, self-consistent view of the gateway's topology.
///
/// Services are ordered by name so that equal topologies always compile to
/// equal declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    pub gateway: GatewayIdentity,
    pub roots: RootCertificateSet,
    pub services: Vec<DownstreamService>,
}

impl TopologySnapshot {
    /// A snapshot with no downstream services.
    pub fn empty(gateway: GatewayIdentity, roots: RootCertificateSet) -> Self {
        Self {
            gateway,
            roots,
            services: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
