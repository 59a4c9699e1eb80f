use prometheus_client::{metrics::counter::Counter, registry::Registry};
use tgw_controller_as3::{Compiler, Rendered};
use tgw_controller_core::{mailbox, TopologySnapshot};
use tgw_controller_index::Handle;

#[derive(Clone, Debug, Default)]
pub struct PublishMetrics {
    declarations: Counter,
    displaced: Counter,
    render_errors: Counter,
}

/// Compiles each topology snapshot and hands the result to the deploy agent.
pub struct Publisher {
    compiler: Compiler,
    declarations: mailbox::Sender<Rendered>,
    metrics: PublishMetrics,
    ready: Option<kubert::admin::Readiness>,
}

// === impl PublishMetrics ===

impl PublishMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "publish_declarations",
            "Count of declarations handed to the deploy agent",
            metrics.declarations.clone(),
        );
        prom.register(
            "publish_displaced",
            "Count of declarations replaced before the deploy agent took them",
            metrics.displaced.clone(),
        );
        prom.register(
            "publish_render_errors",
            "Count of declarations that could not be serialized",
            metrics.render_errors.clone(),
        );
        metrics
    }
}

// === impl Publisher ===

impl Publisher {
    pub fn new(
        compiler: Compiler,
        declarations: mailbox::Sender<Rendered>,
        metrics: PublishMetrics,
    ) -> Self {
        Self {
            compiler,
            declarations,
            metrics,
            ready: None,
        }
    }

    /// Marks the controller ready once the first declaration is published.
    pub fn with_readiness(mut self, ready: kubert::admin::Readiness) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Compiles a snapshot and replaces any declaration the agent has not yet
    /// taken.
    pub fn publish(&self, snapshot: &TopologySnapshot) -> serde_json::Result<()> {
        let rendered = self.compiler.compile(snapshot).render()?;
        tracing::debug!(
            services = snapshot.services.len(),
            bytes = rendered.body.len(),
            "Publishing declaration"
        );
        if self.declarations.offer(rendered).is_some() {
            tracing::debug!("Replaced an undeployed declaration");
            self.metrics.displaced.inc();
        }
        self.metrics.declarations.inc();
        Ok(())
    }

    /// Publishes every snapshot produced by `topology` until `shutdown` is
    /// signaled or the topology's watches end.
    pub async fn run(mut self, mut topology: Handle, shutdown: drain::Watch) {
        let shutdown = shutdown.signaled();
        tokio::pin!(shutdown);

        loop {
            let snapshot = tokio::select! {
                biased;
                _ = &mut shutdown => return,
                snapshot = topology.next() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => return,
                },
            };

            if snapshot.is_empty() {
                tracing::info!("Gateway has no linked services");
            }
            if let Err(error) = self.publish(&snapshot) {
                tracing::error!(%error, "Failed to serialize declaration");
                self.metrics.render_errors.inc();
                continue;
            }
            if let Some(ready) = self.ready.take() {
                ready.set(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tgw_controller_catalog::{
        self as catalog, CaRoot, CaRoots, Catalog, GatewayService, Intention, LeafCert, Node,
        QueryOptions, Response, ServiceEntry, ServiceInfo, ServiceName,
    };
    use tgw_controller_core::{
        DownstreamService, GatewayIdentity, Instance, LeafCertificate, RootCertificateSet,
    };
    use tgw_controller_index::{GatewaySettings, Timing, WatchMetrics};

    #[test]
    fn latest_declaration_wins() {
        let (tx, mut rx) = mailbox::channel();
        let publisher = Publisher::new(Compiler::default(), tx, PublishMetrics::default());

        publisher.publish(&snapshot(&["payments"])).unwrap();
        publisher.publish(&snapshot(&["billing", "payments"])).unwrap();
        assert_eq!(publisher.metrics.declarations.get(), 2);
        assert_eq!(publisher.metrics.displaced.get(), 1);

        let rendered = rx.try_recv().expect("declaration must be pending");
        let names = rendered.request.application().names().collect::<Vec<_>>();
        assert!(names.contains(&"billing-pool"), "{names:?}");
        assert!(names.contains(&"payments-pool"), "{names:?}");
        assert!(rx.try_recv().is_none());

        publisher.publish(&snapshot(&[])).unwrap();
        assert_eq!(publisher.metrics.displaced.get(), 1);
    }

    #[tokio::test]
    async fn publishes_the_bootstrapped_topology() {
        let (drain_tx, drain_rx) = drain::channel();
        let topology = tgw_controller_index::spawn(
            StaticCatalog,
            GatewaySettings {
                name: "tgw".to_string(),
                namespace: None,
            },
            Timing {
                wait: Duration::from_secs(600),
                error_backoff: Duration::from_secs(5),
            },
            WatchMetrics::default(),
            drain_rx.clone(),
        );

        let (tx, mut rx) = mailbox::channel();
        let metrics = PublishMetrics::default();
        let publisher = Publisher::new(Compiler::default(), tx, metrics.clone());
        let task = tokio::spawn(publisher.run(topology, drain_rx));

        let rendered = rx.recv().await.expect("declaration must be published");
        let app = rendered.request.application();
        assert!(app.get("payments-pool").is_some());
        assert!(app.get("payments-cert").is_some());
        assert_eq!(rendered.request.declaration.id, "tgw-1");
        assert!(rendered.body.contains(r#""key":"web:payments""#));
        assert_eq!(metrics.declarations.get(), 1);

        drain_tx.drain().await;
        task.await.expect("publisher must not panic");
        // The agent's mailbox closes with the publisher.
        assert!(rx.recv().await.is_none());
    }

    fn snapshot(services: &[&str]) -> TopologySnapshot {
        TopologySnapshot {
            gateway: GatewayIdentity {
                id: "tgw-1".to_string(),
                name: "tgw".to_string(),
                address: "10.0.0.9".to_string(),
                port: 8443,
            },
            roots: RootCertificateSet::new("r1", vec!["CA1".to_string()]),
            services: services
                .iter()
                .map(|name| DownstreamService {
                    name: name.to_string(),
                    instances: vec![Instance {
                        id: format!("{name}-1"),
                        address: "10.0.0.1".to_string(),
                        port: 8080,
                    }],
                    leaf: LeafCertificate {
                        cert_pem: "CERT".to_string(),
                        key_pem: "KEY".to_string(),
                    },
                    intentions: vec!["web".to_string()],
                    trust_bundle: vec!["CA1".to_string()],
                    proxy_tls: None,
                })
                .collect(),
        }
    }

    /// Answers every query once, then holds later queries forever.
    #[derive(Clone)]
    struct StaticCatalog;

    impl StaticCatalog {
        async fn respond<T>(opts: &QueryOptions, value: T) -> catalog::Result<Response<T>> {
            if opts.index > 0 {
                std::future::pending::<()>().await;
            }
            Ok(Response { value, index: 1 })
        }
    }

    #[async_trait::async_trait]
    impl Catalog for StaticCatalog {
        async fn service_health(
            &self,
            service: &str,
            _: Option<&str>,
            opts: &QueryOptions,
        ) -> catalog::Result<Response<Vec<ServiceEntry>>> {
            let (id, address, port) = match service {
                "tgw" => ("tgw-1", "10.0.0.9", 8443),
                _ => ("payments-1", "10.0.0.1", 8080),
            };
            let entry = ServiceEntry {
                node: Node {
                    node: "node-1".to_string(),
                    address: "10.0.0.2".to_string(),
                },
                service: ServiceInfo {
                    id: id.to_string(),
                    service: service.to_string(),
                    address: address.to_string(),
                    port,
                    namespace: None,
                },
            };
            Self::respond(opts, vec![entry]).await
        }

        async fn gateway_services(
            &self,
            _: &str,
            opts: &QueryOptions,
        ) -> catalog::Result<Response<Vec<GatewayService>>> {
            let linked = GatewayService {
                service: ServiceName {
                    name: "payments".to_string(),
                    namespace: None,
                },
                gateway_kind: "terminating-gateway".to_string(),
                ..Default::default()
            };
            Self::respond(opts, vec![linked]).await
        }

        async fn leaf_certificate(
            &self,
            service: &str,
            opts: &QueryOptions,
        ) -> catalog::Result<Response<LeafCert>> {
            let leaf = LeafCert {
                serial_number: "01".to_string(),
                cert_pem: format!("CERT-{service}"),
                private_key_pem: format!("KEY-{service}"),
                ..Default::default()
            };
            Self::respond(opts, leaf).await
        }

        async fn intentions(
            &self,
            destination: &str,
            opts: &QueryOptions,
        ) -> catalog::Result<Response<Vec<Intention>>> {
            let allow = Intention {
                source_name: "web".to_string(),
                destination_name: destination.to_string(),
                action: "allow".to_string(),
            };
            Self::respond(opts, vec![allow]).await
        }

        async fn ca_roots(&self, opts: &QueryOptions) -> catalog::Result<Response<CaRoots>> {
            let roots = CaRoots {
                active_root_id: "r1".to_string(),
                roots: vec![CaRoot {
                    id: "r1".to_string(),
                    name: "root".to_string(),
                    root_cert_pem: "CA1".to_string(),
                    active: true,
                }],
            };
            Self::respond(opts, roots).await
        }
    }
}
