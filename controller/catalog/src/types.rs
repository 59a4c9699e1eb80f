//! Catalog wire types and their conversions into the controller's model.

use serde::Deserialize;
use tgw_controller_core::{GatewayIdentity, Instance, LeafCertificate, LinkedService, ProxyTls};

/// An entry returned by `/v1/health/service/:name`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEntry {
    #[serde(default)]
    pub node: Node,
    pub service: ServiceInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceInfo {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// An entry returned by `/v1/catalog/gateway-services/:gateway`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayService {
    pub service: ServiceName,
    #[serde(default)]
    pub gateway_kind: String,
    #[serde(default, rename = "CAFile")]
    pub ca_file: String,
    #[serde(default)]
    pub cert_file: String,
    #[serde(default)]
    pub key_file: String,
    #[serde(default, rename = "SNI")]
    pub sni: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceName {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// The response of `/v1/agent/connect/ca/leaf/:service`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeafCert {
    #[serde(default)]
    pub serial_number: String,
    #[serde(rename = "CertPEM")]
    pub cert_pem: String,
    #[serde(rename = "PrivateKeyPEM")]
    pub private_key_pem: String,
    #[serde(default)]
    pub valid_after: String,
    #[serde(default)]
    pub valid_before: String,
}

/// An entry returned by `/v1/connect/intentions`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Intention {
    pub source_name: String,
    pub destination_name: String,
    pub action: String,
}

/// The response of `/v1/agent/connect/ca/roots`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaRoots {
    #[serde(rename = "ActiveRootID")]
    pub active_root_id: String,
    #[serde(default)]
    pub roots: Vec<CaRoot>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaRoot {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "RootCert")]
    pub root_cert_pem: String,
    #[serde(default)]
    pub active: bool,
}

// === impl ServiceEntry ===

impl ServiceEntry {
    /// The entry as a reachable instance, using the node's address when the
    /// service did not register one of its own.
    pub fn to_instance(&self) -> Instance {
        let address = if self.service.address.is_empty() {
            self.node.address.clone()
        } else {
            self.service.address.clone()
        };
        Instance {
            id: self.service.id.clone(),
            address,
            port: self.service.port,
        }
    }

    /// The entry as the gateway's own registration.
    pub fn to_gateway_identity(&self) -> GatewayIdentity {
        GatewayIdentity {
            id: self.service.id.clone(),
            name: self.service.service.clone(),
            address: self.service.address.clone(),
            port: self.service.port,
        }
    }
}

// === impl GatewayService ===

impl GatewayService {
    pub fn to_linked_service(&self) -> LinkedService {
        fn non_empty(s: &str) -> Option<String> {
            (!s.is_empty()).then(|| s.to_string())
        }

        let proxy_tls = ProxyTls {
            ca_file: non_empty(&self.ca_file),
            cert_file: non_empty(&self.cert_file),
            key_file: non_empty(&self.key_file),
            sni: non_empty(&self.sni),
        };
        let proxy_tls = (proxy_tls != ProxyTls::default()).then_some(proxy_tls);

        LinkedService {
            name: self.service.name.clone(),
            namespace: self.service.namespace.as_deref().and_then(non_empty),
            proxy_tls,
        }
    }
}

// === impl LeafCert ===

impl LeafCert {
    pub fn to_leaf_certificate(&self) -> LeafCertificate {
        LeafCertificate {
            cert_pem: self.cert_pem.clone(),
            key_pem: self.private_key_pem.clone(),
        }
    }
}

impl std::fmt::Debug for LeafCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafCert")
            .field("serial_number", &self.serial_number)
            .field("valid_after", &self.valid_after)
            .field("valid_before", &self.valid_before)
            .finish_non_exhaustive()
    }
}

// === impl Intention ===

impl Intention {
    pub fn is_allow(&self) -> bool {
        self.action == "allow"
    }

    /// The names of the sources permitted by `intentions`, in order.
    pub fn allowed_sources(intentions: &[Self]) -> Vec<String> {
        intentions
            .iter()
            .filter(|i| i.is_allow())
            .map(|i| i.source_name.clone())
            .collect()
    }
}

// === impl CaRoots ===

impl CaRoots {
    /// The PEM-encoded roots, in catalog order.
    pub fn pems(&self) -> impl Iterator<Item = String> + '_ {
        self.roots.iter().map(|r| r.root_cert_pem.clone())
    }
}
