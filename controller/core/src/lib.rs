//! Value types shared by the terminating-gateway controller, along with the
//! small synchronization primitives used to move them between tasks.
//!
//! ```text
//! [ watchers ] -> [ TopologyStore ] -> TopologySnapshot -> [ compiler ] -> Mailbox -> [ agent ]
//! ```

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod changes;
mod identity;
pub mod latch;
pub mod mailbox;
mod roots;
mod service;
mod snapshot;

pub use self::{
    identity::GatewayIdentity,
    latch::Latch,
    roots::RootCertificateSet,
    service::{DownstreamService, Instance, LeafCertificate, LinkedService, ProxyTls},
    snapshot::TopologySnapshot,
};
