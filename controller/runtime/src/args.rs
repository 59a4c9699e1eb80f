use crate::{
    as3::{Agent, TENANT},
    catalog,
    config::{Config, Overrides},
    core::mailbox,
    duration::parse_duration,
    index::{self, Timing, WatchMetrics},
    PublishMetrics, Publisher,
};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use prometheus_client::registry::Registry;
use std::{path::PathBuf, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "tgw-controller",
    about = "Configures a BIG-IP as a Consul terminating gateway"
)]
pub struct Args {
    #[clap(long, default_value = "tgw=info,warn", env = "TGW_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// A YAML configuration file. Defaults to `config.yaml` when it exists.
    #[clap(long, env = "TGW_CONFIG")]
    config: Option<PathBuf>,

    #[clap(flatten)]
    overrides: Overrides,

    /// How long a blocking catalog query may wait for a change.
    #[clap(long, default_value = "10m", value_parser = parse_duration)]
    watch_wait: Duration,

    /// How long to wait before retrying a failed catalog query.
    #[clap(long, default_value = "5s", value_parser = parse_duration)]
    error_backoff: Duration,

    /// How long to wait before resubmitting a declaration the BIG-IP
    /// rejected.
    #[clap(long, default_value = "10s", value_parser = parse_duration)]
    deploy_retry: Duration,

    /// How long a single request to the BIG-IP may take.
    #[clap(long, default_value = "1m", value_parser = parse_duration)]
    deploy_timeout: Duration,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Deletes the gateway's tenant, and everything in it, from the BIG-IP.
    Remove,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            admin,
            config,
            overrides,
            watch_wait,
            error_backoff,
            deploy_retry,
            deploy_timeout,
            command,
        } = self;

        log_format.try_init(log_level)?;

        let settings = Config::load(config.as_deref())?
            .with_overrides(overrides)
            .settings()?;
        let agent = Agent::new(settings.agent(deploy_retry, deploy_timeout))?;

        if command == Some(Command::Remove) {
            agent.remove_tenant(TENANT).await?;
            info!(tenant = TENANT, "Removed tenant");
            return Ok(());
        }

        let catalog = catalog::Client::new(settings.consul.clone())?;

        let mut prom = <Registry>::default();
        let watch_metrics = WatchMetrics::register(&mut prom);
        let publish_metrics = PublishMetrics::register(&mut prom);

        let admin = admin.into_builder().with_prometheus(prom).bind()?;
        let readiness = admin.readiness();
        admin.spawn();

        // Watches and the publisher share a drain that is released once the
        // process is signaled. A second signal aborts the drain.
        let (shutdown, watch) = kubert::shutdown::sigint_or_sigterm()?;
        let (drain_tx, drain_rx) = drain::channel();
        tokio::spawn(async move {
            let release = watch.signaled().await;
            info!("Shutting down");
            drain_tx.drain().await;
            drop(release);
        });

        info!(
            gateway = %settings.gateway.name,
            consul = %settings.consul.address,
            bigip = %settings.bigip.url,
            "Starting"
        );
        let topology = index::spawn(
            catalog,
            settings.gateway.clone(),
            Timing {
                wait: watch_wait,
                error_backoff,
            },
            watch_metrics,
            drain_rx.clone(),
        );

        let (declarations, deployments) = mailbox::channel();
        tokio::spawn(agent.run(deployments).instrument(info_span!("agent")));

        let publisher = Publisher::new(settings.compiler.clone(), declarations, publish_metrics)
            .with_readiness(readiness);
        tokio::spawn(
            publisher
                .run(topology, drain_rx)
                .instrument(info_span!("publish")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the background tasks to complete before exiting.
        if shutdown.signaled().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
