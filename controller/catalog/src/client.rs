use crate::{
    CaRoots, Catalog, Error, GatewayService, Intention, LeafCert, QueryOptions, Response, Result,
    ServiceEntry,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

// Consul adds up to wait/16 of jitter to a blocking query, so requests are
// bounded by the wait, the jitter and this allowance for the round trip.
const REQUEST_SLACK: Duration = Duration::from_secs(5);

/// Settings for the Consul HTTP API client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// The agent's `host:port`, optionally prefixed with a scheme.
    pub address: String,
    pub scheme: String,
    pub datacenter: Option<String>,
    pub token: Option<String>,

    /// The namespace used when a query does not name one.
    pub namespace: Option<String>,
}

/// A Consul HTTP API client.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: reqwest::Url,
    datacenter: Option<String>,
    namespace: Option<String>,
}

// === impl ClientConfig ===

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".to_string(),
            scheme: "http".to_string(),
            datacenter: None,
            token: None,
            namespace: None,
        }
    }
}

impl ClientConfig {
    fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.contains("://") {
            address.to_string()
        } else {
            format!("{}://{}", self.scheme, address)
        }
    }
}

// === impl Client ===

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut token = HeaderValue::from_str(token).map_err(|_| Error::InvalidToken)?;
            token.set_sensitive(true);
            headers.insert(TOKEN_HEADER, token);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let base_url = config.base_url();
        let base_url = reqwest::Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or(Error::InvalidAddress(base_url))?;

        Ok(Self {
            http,
            base_url,
            datacenter: config.datacenter.filter(|dc| !dc.is_empty()),
            namespace: config.namespace.filter(|ns| !ns.is_empty()),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        path: &[&str],
        mut params: Vec<(&'static str, String)>,
        namespace: Option<&str>,
        opts: &QueryOptions,
    ) -> Result<Response<T>> {
        if let Some(dc) = &self.datacenter {
            params.push(("dc", dc.clone()));
        }
        if let Some(ns) = namespace
            .filter(|ns| !ns.is_empty())
            .or(self.namespace.as_deref())
        {
            params.push(("ns", ns.to_string()));
        }
        if opts.index > 0 {
            params.push(("index", opts.index.to_string()));
        }
        params.push(("wait", format_wait(opts.wait)));

        // Names are pushed as single segments so they are escaped.
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidAddress(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path);

        tracing::trace!(path = %url.path(), index = opts.index, "Querying");
        let rsp = self
            .http
            .get(url)
            .query(&params)
            .timeout(opts.wait + opts.wait / 16 + REQUEST_SLACK)
            .send()
            .await?;

        let index = parse_index(rsp.headers());
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status,
                body,
                index,
            });
        }

        let index = index.ok_or(Error::MissingIndex)?;
        let value = rsp.json::<T>().await.map_err(|source| Error::Decode {
            source,
            index: Some(index),
        })?;
        Ok(Response { value, index })
    }
}

#[async_trait::async_trait]
impl Catalog for Client {
    async fn service_health(
        &self,
        service: &str,
        namespace: Option<&str>,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<ServiceEntry>>> {
        self.query(
            &["v1", "health", "service", service],
            vec![],
            namespace,
            opts,
        )
        .await
    }

    async fn gateway_services(
        &self,
        gateway: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<GatewayService>>> {
        self.query(
            &["v1", "catalog", "gateway-services", gateway],
            vec![],
            None,
            opts,
        )
        .await
    }

    async fn leaf_certificate(
        &self,
        service: &str,
        opts: &QueryOptions,
    ) -> Result<Response<LeafCert>> {
        self.query(
            &["v1", "agent", "connect", "ca", "leaf", service],
            vec![],
            None,
            opts,
        )
        .await
    }

    async fn intentions(
        &self,
        destination: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<Intention>>> {
        let filter = format!("DestinationName == \"{destination}\"");
        self.query(
            &["v1", "connect", "intentions"],
            vec![("filter", filter)],
            None,
            opts,
        )
        .await
    }

    async fn ca_roots(&self, opts: &QueryOptions) -> Result<Response<CaRoots>> {
        self.query(&["v1", "agent", "connect", "ca", "roots"], vec![], None, opts)
            .await
    }
}

pub(crate) fn parse_index(headers: &HeaderMap) -> Option<u64> {
    headers.get(INDEX_HEADER)?.to_str().ok()?.trim().parse().ok()
}

pub(crate) fn format_wait(wait: Duration) -> String {
    if wait.subsec_millis() == 0 && wait.as_secs() > 0 {
        format!("{}s", wait.as_secs())
    } else {
        format!("{}ms", wait.as_millis())
    }
}
