/// An entry in the gateway's linked-service list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkedService {
    pub name: String,

    /// The namespace in which the service's instances are registered. Unset
    /// when the catalog does not support namespaces.
    pub namespace: Option<String>,

    /// TLS settings the gateway uses when originating connections to the
    /// service, if any were configured on the link.
    pub proxy_tls: Option<ProxyTls>,
}

/// Upstream-proxy TLS settings attached to a gateway link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyTls {
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub sni: Option<String>,
}

/// A single reachable endpoint of a downstream service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub address: String,
    pub port: u16,
}

/// A mesh-issued leaf certificate and its private key, both PEM-encoded.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LeafCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

/// A fully-known downstream service, as it appears in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownstreamService {
    pub name: String,
    pub instances: Vec<Instance>,

    /// Names of the services allowed to reach this one.
    pub intentions: Vec<String>,

    pub leaf: LeafCertificate,
    pub proxy_tls: Option<ProxyTls>,

    /// PEM-encoded mesh roots used as this service's certificate chain.
    pub trust_bundle: Vec<String>,
}

// === impl LeafCertificate ===

// Keeps private keys out of logs.
impl std::fmt::Debug for LeafCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafCertificate")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

// === impl DownstreamService ===

impl DownstreamService {
    /// Returns the service's trust chain as a single PEM document.
    pub fn chain_pem(&self) -> String {
        self.trust_bundle.concat()
    }
}
