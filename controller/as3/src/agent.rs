//! Applies declarations to a BIG-IP through the AS3 API.

use crate::declaration::Rendered;
use std::time::Duration;
use tgw_controller_core::mailbox;
use tokio::time;

const DECLARE_PATH: [&str; 4] = ["mgmt", "shared", "appsvcs", "declare"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// The BIG-IP management URL, e.g. `https://10.0.0.1:8443`.
    pub url: String,
    pub username: String,
    pub password: String,

    /// Skips verification of the BIG-IP's certificate.
    pub insecure: bool,

    /// How long to wait before resubmitting a declaration that failed to
    /// deploy.
    pub retry: Duration,

    /// Bounds each request to the BIG-IP.
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Agent {
    http: reqwest::Client,
    declare: reqwest::Url,
    username: String,
    password: String,
    retry: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("BIG-IP responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid BIG-IP URL {0}")]
    InvalidUrl(String),
}

// === impl Agent ===

impl Agent {
    pub fn new(config: AgentConfig) -> Result<Self, Error> {
        if config.insecure {
            tracing::warn!("BIG-IP certificate verification is disabled");
        }
        let mut declare = reqwest::Url::parse(&config.url)
            .map_err(|_| Error::InvalidUrl(config.url.clone()))?;
        declare
            .path_segments_mut()
            .map_err(|()| Error::InvalidUrl(config.url.clone()))?
            .pop_if_empty()
            .extend(DECLARE_PATH);

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            declare,
            username: config.username,
            password: config.password,
            retry: config.retry,
        })
    }

    /// Submits a declaration.
    pub async fn deploy(&self, rendered: &Rendered) -> Result<(), Error> {
        let rsp = self
            .http
            .post(self.declare.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(rendered.body.clone())
            .send()
            .await?;
        Self::check(rsp).await
    }

    /// Deletes a tenant and everything declared in it.
    pub async fn remove_tenant(&self, tenant: &str) -> Result<(), Error> {
        let mut url = self.declare.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.declare.to_string()))?
            .push(tenant);

        let rsp = self
            .http
            .delete(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Self::check(rsp).await
    }

    async fn check(rsp: reqwest::Response) -> Result<(), Error> {
        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = rsp.text().await.unwrap_or_default();
        Err(Error::Status { status, body })
    }

    /// Deploys each declaration received from the mailbox until its sender is
    /// dropped.
    ///
    /// A failed deployment is retried after a delay, unless a newer
    /// declaration arrives first.
    pub async fn run(self, mut declarations: mailbox::Receiver<Rendered>) {
        let mut next = None;
        loop {
            let rendered = match next.take() {
                Some(rendered) => rendered,
                None => match declarations.recv().await {
                    Some(rendered) => rendered,
                    None => return,
                },
            };

            match self.deploy(&rendered).await {
                Ok(()) => {
                    tracing::info!(bytes = rendered.body.len(), "Deployed declaration");
                }
                Err(error) => {
                    tracing::warn!(%error, retry = ?self.retry, "Failed to deploy declaration");
                    next = tokio::select! {
                        biased;
                        newer = declarations.recv() => match newer {
                            Some(newer) => Some(newer),
                            None => return,
                        },
                        _ = time::sleep(self.retry) => Some(rendered),
                    };
                }
            }
        }
    }
}
