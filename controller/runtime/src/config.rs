//! Controller settings.
//!
//! Settings are read from an optional YAML file with `gateway`, `consul` and
//! `bigip` sections. Any setting may be overridden by a command-line flag or
//! its environment variable.

use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tgw_controller_as3::{AgentConfig, Compiler, DEFAULT_SCHEMA, DEFAULT_SCHEMA_VERSION};
use tgw_controller_catalog::ClientConfig;
use tgw_controller_index::GatewaySettings;

/// Read when no path is given, if it exists.
pub const DEFAULT_PATH: &str = "config.yaml";

const DEFAULT_BIGIP_USERNAME: &str = "admin";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub consul: ConsulConfig,
    pub bigip: BigIpConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsulConfig {
    pub address: Option<String>,
    pub scheme: Option<String>,
    pub datacenter: Option<String>,
    pub token: Option<Secret>,
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BigIpConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub insecure: Option<bool>,
    pub schema: Option<String>,
    pub schema_version: Option<String>,
}

/// A credential that is never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

/// Flags that take precedence over the configuration file.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct Overrides {
    /// The name of the terminating gateway's service.
    #[clap(long, env = "TGW_GATEWAY_NAME")]
    gateway_name: Option<String>,

    /// The namespace in which the gateway is registered.
    #[clap(long, env = "TGW_GATEWAY_NAMESPACE")]
    gateway_namespace: Option<String>,

    /// The Consul agent's `host:port`.
    #[clap(long, env = "CONSUL_HTTP_ADDR")]
    consul_address: Option<String>,

    #[clap(long, env = "CONSUL_SCHEME")]
    consul_scheme: Option<String>,

    #[clap(long, env = "CONSUL_DATACENTER")]
    consul_datacenter: Option<String>,

    #[clap(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    consul_token: Option<Secret>,

    #[clap(long, env = "CONSUL_NAMESPACE")]
    consul_namespace: Option<String>,

    /// The BIG-IP management URL.
    #[clap(long, env = "BIGIP_URL")]
    bigip_url: Option<String>,

    #[clap(long, env = "BIGIP_USERNAME")]
    bigip_username: Option<String>,

    #[clap(long, env = "BIGIP_PASSWORD", hide_env_values = true)]
    bigip_password: Option<Secret>,

    /// Skips verification of the BIG-IP's certificate.
    #[clap(long, env = "BIGIP_INSECURE")]
    bigip_insecure: bool,

    /// The AS3 schema URL referenced by declarations.
    #[clap(long, env = "AS3_SCHEMA")]
    as3_schema: Option<String>,

    #[clap(long, env = "AS3_SCHEMA_VERSION")]
    as3_schema_version: Option<String>,
}

/// Validated settings with defaults applied.
#[derive(Clone, Debug)]
pub struct Settings {
    pub gateway: GatewaySettings,
    pub consul: ClientConfig,
    pub bigip: BigIpSettings,
    pub compiler: Compiler,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BigIpSettings {
    pub url: String,
    pub username: String,
    pub password: Secret,
    pub insecure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

// === impl Config ===

impl Config {
    /// Reads the configuration file at `path`.
    ///
    /// Without a path, [`DEFAULT_PATH`] is read if it exists; otherwise every
    /// setting must come from flags.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = PathBuf::from(DEFAULT_PATH);
                if !path.exists() {
                    tracing::debug!("No configuration file");
                    return Ok(Self::default());
                }
                path
            }
        };

        let yaml = std::fs::read_to_string(&path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&yaml).map_err(|source| Error::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> serde_yaml::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        let Overrides {
            gateway_name,
            gateway_namespace,
            consul_address,
            consul_scheme,
            consul_datacenter,
            consul_token,
            consul_namespace,
            bigip_url,
            bigip_username,
            bigip_password,
            bigip_insecure,
            as3_schema,
            as3_schema_version,
        } = overrides;

        fn set<T>(setting: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *setting = value;
            }
        }

        set(&mut self.gateway.name, gateway_name);
        set(&mut self.gateway.namespace, gateway_namespace);
        set(&mut self.consul.address, consul_address);
        set(&mut self.consul.scheme, consul_scheme);
        set(&mut self.consul.datacenter, consul_datacenter);
        set(&mut self.consul.token, consul_token);
        set(&mut self.consul.namespace, consul_namespace);
        set(&mut self.bigip.url, bigip_url);
        set(&mut self.bigip.username, bigip_username);
        set(&mut self.bigip.password, bigip_password);
        if bigip_insecure {
            self.bigip.insecure = Some(true);
        }
        set(&mut self.bigip.schema, as3_schema);
        set(&mut self.bigip.schema_version, as3_schema_version);
        self
    }

    /// Checks that required settings are present and fills in defaults.
    pub fn settings(self) -> Result<Settings, Error> {
        let Self {
            gateway,
            consul,
            bigip,
        } = self;

        let gateway = GatewaySettings {
            name: required(gateway.name, "gateway.name")?,
            namespace: non_empty(gateway.namespace),
        };

        let defaults = ClientConfig::default();
        let consul = ClientConfig {
            address: non_empty(consul.address).unwrap_or(defaults.address),
            scheme: non_empty(consul.scheme).unwrap_or(defaults.scheme),
            datacenter: non_empty(consul.datacenter),
            token: non_empty(consul.token.map(Secret::into_inner)),
            namespace: non_empty(consul.namespace),
        };

        let password = bigip
            .password
            .filter(|p| !p.0.is_empty())
            .ok_or(Error::Missing("bigip.password"))?;
        let compiler = Compiler::new(
            non_empty(bigip.schema).unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            non_empty(bigip.schema_version).unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_string()),
        );
        let bigip = BigIpSettings {
            url: required(bigip.url, "bigip.url")?,
            username: non_empty(bigip.username)
                .unwrap_or_else(|| DEFAULT_BIGIP_USERNAME.to_string()),
            password,
            insecure: bigip.insecure.unwrap_or(false),
        };

        Ok(Settings {
            gateway,
            consul,
            bigip,
            compiler,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, Error> {
    non_empty(value).ok_or(Error::Missing(name))
}

// === impl Settings ===

impl Settings {
    pub fn agent(&self, retry: Duration, timeout: Duration) -> AgentConfig {
        AgentConfig {
            url: self.bigip.url.clone(),
            username: self.bigip.username.clone(),
            password: self.bigip.password.expose().to_string(),
            insecure: self.bigip.insecure,
            retry,
            timeout,
        }
    }
}

// === impl Secret ===

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::str::FromStr for Secret {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}
