//! Blocking-query access to the Consul catalog.
//!
//! Every query takes the last index the caller has seen and a maximum wait.
//! The server holds the request until the result's index moves past the given
//! one or the wait elapses, then answers with the result and its current
//! index. An unchanged index means nothing changed; an index that moves
//! backwards means the caller must resynchronize from scratch.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod types;


pub use self::{
    client::{Client, ClientConfig},
    types::{
        CaRoot, CaRoots, GatewayService, Intention, LeafCert, Node, ServiceEntry, ServiceInfo,
        ServiceName,
    },
};
use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Blocking-query parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueryOptions {
    /// The last index observed by the caller. Zero requests the current state
    /// without blocking.
    pub index: u64,

    /// The longest the server may hold the query.
    pub wait: Duration,
}

/// A query result along with the index at which it was read.
#[derive(Clone, Debug, PartialEq)]
pub struct Response<T> {
    pub value: T,
    pub index: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
        index: Option<u64>,
    },

    #[error("failed to decode response: {source}")]
    Decode {
        #[source]
        source: reqwest::Error,
        index: Option<u64>,
    },

    #[error("response did not include an index")]
    MissingIndex,

    #[error("ACL token is not a valid header value")]
    InvalidToken,

    #[error("invalid Consul address {0}")]
    InvalidAddress(String),
}

/// The catalog queries the gateway watcher depends on.
#[async_trait::async_trait]
pub trait Catalog: Clone + Send + Sync + 'static {
    /// Lists the registered instances of `service`, regardless of health.
    async fn service_health(
        &self,
        service: &str,
        namespace: Option<&str>,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<ServiceEntry>>>;

    /// Lists the services linked to `gateway`.
    async fn gateway_services(
        &self,
        gateway: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<GatewayService>>>;

    /// Fetches (issuing if necessary) the mesh leaf certificate for `service`.
    async fn leaf_certificate(&self, service: &str, opts: &QueryOptions)
        -> Result<Response<LeafCert>>;

    /// Lists the intentions whose destination is `destination`.
    async fn intentions(
        &self,
        destination: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<Intention>>>;

    /// Lists the mesh's trusted roots.
    async fn ca_roots(&self, opts: &QueryOptions) -> Result<Response<CaRoots>>;
}

// === impl QueryOptions ===

impl QueryOptions {
    pub fn new(index: u64, wait: Duration) -> Self {
        Self { index, wait }
    }
}

// === impl Error ===

impl Error {
    /// The index reported alongside the failure, if the server returned one.
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::Status { index, .. } | Self::Decode { index, .. } => *index,
            Self::Transport(_)
            | Self::MissingIndex
            | Self::InvalidToken
            | Self::InvalidAddress(_) => None,
        }
    }
}
