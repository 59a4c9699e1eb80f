use crate::declaration::*;
use base64::Engine;
use tgw_controller_core::{DownstreamService, TopologySnapshot};

pub const DEFAULT_SCHEMA: &str =
    "https://raw.githubusercontent.com/F5Networks/f5-appsvcs-extension/master/schema/latest/as3-schema.json";
pub const DEFAULT_SCHEMA_VERSION: &str = "3.20.0";

const USER_AGENT: &str = "TGW Configured AS3";

const VIRTUAL_SERVER: &str = "TG_Vserver";
const SERVER_TLS: &str = "webtls";
const CA_BUNDLE: &str = "cabundle";
const SNI_POLICY: &str = "SNIrouting";
const INTENTION_RULE: &str = "intentionRule";
const INTENTION_GROUP: &str = "target-dg";

const SNI_EVENT: &str = "ssl-client-hello";

static INTENTION_IRULE: &str = include_str!("intention.irule");

/// Compiles topology snapshots into AS3 declarations.
///
/// Compilation is a pure function of the snapshot: equal snapshots always
/// yield equal declarations, and every snapshot (including one with no
/// services, or services with no instances) yields a valid declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compiler {
    schema: String,
    schema_version: String,
}

// === impl Compiler ===

impl Default for Compiler {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA, DEFAULT_SCHEMA_VERSION)
    }
}

impl Compiler {
    pub fn new(schema: impl Into<String>, schema_version: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            schema_version: schema_version.into(),
        }
    }

    pub fn compile(&self, snapshot: &TopologySnapshot) -> As3Request {
        let services = &snapshot.services;

        let mut app = Application::new();
        app.insert(
            VIRTUAL_SERVER,
            ServiceTcp {
                virtual_addresses: vec![snapshot.gateway.address.clone()],
                virtual_port: snapshot.gateway.port,
                server_tls: SERVER_TLS.to_string(),
                policy_endpoint: SNI_POLICY.to_string(),
                irules: vec![INTENTION_RULE.to_string()],
            },
        );
        for svc in services {
            app.insert(pool_name(&svc.name), pool(svc));
        }
        app.insert(
            CA_BUNDLE,
            CaBundle {
                bundle: snapshot.roots.bundle(),
            },
        );
        app.insert(SERVER_TLS, server_tls(services));
        for svc in services {
            app.insert(
                cert_name(&svc.name),
                Certificate {
                    certificate: svc.leaf.cert_pem.clone(),
                    private_key: svc.leaf.key_pem.clone(),
                    chain_ca: svc.chain_pem(),
                },
            );
        }
        app.insert(SNI_POLICY, sni_policy(services));
        app.insert(
            INTENTION_RULE,
            IRule {
                irule: Pointer::Base64(
                    base64::engine::general_purpose::STANDARD.encode(INTENTION_IRULE),
                ),
            },
        );
        app.insert(INTENTION_GROUP, intention_group(services));

        As3Request {
            schema: self.schema.clone(),
            class: "AS3",
            action: "deploy",
            persist: true,
            declaration: Declaration {
                class: "ADC",
                schema_version: self.schema_version.clone(),
                id: snapshot.gateway.id.clone(),
                label: snapshot.gateway.name.clone(),
                remark: "Terminating gateway".to_string(),
                controls: Controls {
                    class: "Controls",
                    user_agent: USER_AGENT.to_string(),
                },
                tenant: Tenant {
                    class: "Tenant",
                    default_route_domain: 0,
                    application: app,
                },
            },
        }
    }
}

fn pool_name(service: &str) -> String {
    format!("{service}-pool")
}

fn cert_name(service: &str) -> String {
    format!("{service}-cert")
}

fn pool(svc: &DownstreamService) -> Pool {
    Pool {
        label: svc.name.clone(),
        members: svc
            .instances
            .iter()
            .map(|i| Member {
                service_port: i.port,
                server_addresses: vec![i.address.clone()],
            })
            .collect(),
        monitors: vec![],
    }
}

fn server_tls(services: &[DownstreamService]) -> TlsServer {
    TlsServer {
        label: "TLS Termination".to_string(),
        certificates: services
            .iter()
            .map(|s| CertificateRef {
                certificate: cert_name(&s.name),
            })
            .collect(),
        authentication_mode: "require".to_string(),
        authentication_frequency: "every-time".to_string(),
        authentication_trust_ca: CA_BUNDLE.to_string(),
    }
}

fn sni_policy(services: &[DownstreamService]) -> EndpointPolicy {
    let rules = services
        .iter()
        .map(|s| PolicyRule {
            name: format!("forward_to_{}", s.name),
            conditions: vec![Condition {
                kind: "sslExtension".to_string(),
                event: SNI_EVENT.to_string(),
                server_name: CompareString {
                    operand: "starts-with".to_string(),
                    values: vec![s.name.clone()],
                    case_sensitive: false,
                },
                normalized: false,
            }],
            actions: vec![Action {
                kind: "forward".to_string(),
                event: SNI_EVENT.to_string(),
                select: ForwardSelect {
                    pool: Pointer::Use(pool_name(&s.name)),
                },
            }],
        })
        .collect();

    EndpointPolicy {
        label: "SNI Routing".to_string(),
        rules,
    }
}

fn intention_group(services: &[DownstreamService]) -> DataGroup {
    let edges = services.iter().flat_map(|s| {
        s.intentions.iter().map(move |source| Record {
            key: format!("{source}:{}", s.name),
            value: "allow".to_string(),
        })
    });

    // The iRule rejects unknown keys; the placeholder keeps the group
    // non-empty.
    let records = std::iter::once(Record {
        key: "dummy".to_string(),
        value: "disallow".to_string(),
    })
    .chain(edges)
    .collect();

    DataGroup {
        label: "Intentions".to_string(),
        name: INTENTION_GROUP.to_string(),
        storage_type: "internal".to_string(),
        key_data_type: "string".to_string(),
        records,
    }
}
