//! The subset of the AS3 declaration schema emitted for a terminating gateway.
//!
//! A declaration holds a single tenant, which holds a single application. The
//! application's members are an ordered map of object names to objects, each
//! tagged with its AS3 class.

use indexmap::IndexMap;
use serde::Serialize;

pub const TENANT: &str = "TGW_Tenant";
pub const APPLICATION: &str = "TerminatingGateway";

/// The body POSTed to `/mgmt/shared/appsvcs/declare`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct As3Request {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub class: &'static str,
    pub action: &'static str,
    pub persist: bool,
    pub declaration: Declaration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub class: &'static str,
    pub schema_version: String,
    pub id: String,
    pub label: String,
    pub remark: String,
    pub controls: Controls,
    #[serde(rename = "TGW_Tenant")]
    pub tenant: Tenant,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub class: &'static str,
    pub user_agent: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub class: &'static str,
    pub default_route_domain: u32,
    #[serde(rename = "TerminatingGateway")]
    pub application: Application,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Application {
    class: &'static str,
    template: &'static str,
    #[serde(flatten)]
    objects: IndexMap<String, Object>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "class")]
pub enum Object {
    #[serde(rename = "Service_TCP")]
    ServiceTcp(ServiceTcp),
    Pool(Pool),
    #[serde(rename = "CA_Bundle")]
    CaBundle(CaBundle),
    #[serde(rename = "TLS_Server")]
    TlsServer(TlsServer),
    Certificate(Certificate),
    #[serde(rename = "Endpoint_Policy")]
    EndpointPolicy(EndpointPolicy),
    #[serde(rename = "iRule")]
    IRule(IRule),
    #[serde(rename = "Data_Group")]
    DataGroup(DataGroup),
}

/// A reference to another object, either by name or inline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pointer {
    Use(String),
    Base64(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTcp {
    pub virtual_addresses: Vec<String>,
    pub virtual_port: u16,
    #[serde(rename = "serverTLS")]
    pub server_tls: String,
    pub policy_endpoint: String,
    #[serde(rename = "iRules")]
    pub irules: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pool {
    pub label: String,
    pub members: Vec<Member>,
    pub monitors: Vec<Pointer>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub service_port: u16,
    pub server_addresses: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaBundle {
    pub bundle: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsServer {
    pub label: String,
    pub certificates: Vec<CertificateRef>,
    pub authentication_mode: String,
    pub authentication_frequency: String,
    #[serde(rename = "authenticationTrustCA")]
    pub authentication_trust_ca: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CertificateRef {
    pub certificate: String,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub certificate: String,
    pub private_key: String,
    #[serde(rename = "chainCA")]
    pub chain_ca: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndpointPolicy {
    pub label: String,
    pub rules: Vec<PolicyRule>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub server_name: CompareString,
    pub normalized: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareString {
    pub operand: String,
    pub values: Vec<String>,
    pub case_sensitive: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub select: ForwardSelect,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForwardSelect {
    pub pool: Pointer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IRule {
    #[serde(rename = "iRule")]
    pub irule: Pointer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataGroup {
    pub label: String,
    pub name: String,
    pub storage_type: String,
    pub key_data_type: String,
    pub records: Vec<Record>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    pub key: String,
    pub value: String,
}

/// A declaration along with its serialized body.
#[derive(Clone, Debug, PartialEq)]
pub struct Rendered {
    pub request: As3Request,
    pub body: String,
}

// === impl As3Request ===

impl As3Request {
    pub fn render(self) -> serde_json::Result<Rendered> {
        let body = serde_json::to_string(&self)?;
        Ok(Rendered {
            request: self,
            body,
        })
    }

    /// The application holding the gateway's objects.
    pub fn application(&self) -> &Application {
        &self.declaration.tenant.application
    }
}

// === impl Application ===

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self {
            class: "Application",
            template: "generic",
            objects: IndexMap::new(),
        }
    }

    /// Appends an object, replacing any object already using `name` in
    /// place.
    pub fn insert(&mut self, name: impl Into<String>, object: impl Into<Object>) {
        self.objects.insert(name.into(), object.into());
    }

    pub fn get(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    /// Iterates over object names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// === impl Object ===

macro_rules! impl_from_object {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Object {
                fn from(o: $variant) -> Self {
                    Self::$variant(o)
                }
            }
        )+
    };
}

impl_from_object!(
    ServiceTcp,
    Pool,
    CaBundle,
    TlsServer,
    Certificate,
    EndpointPolicy,
    IRule,
    DataGroup,
);

// === impl Certificate ===

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .field("chain_ca", &self.chain_ca)
            .finish()
    }
}
