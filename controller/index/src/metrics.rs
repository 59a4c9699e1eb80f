use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Default)]
pub struct WatchMetrics {
    updates: Family<KindLabels, Counter>,
    errors: Family<KindLabels, Counter>,
    resyncs: Family<KindLabels, Counter>,
    services: Gauge,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

impl WatchMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "watch_updates",
            "Count of catalog changes applied to the topology",
            metrics.updates.clone(),
        );
        prom.register(
            "watch_errors",
            "Count of failed catalog queries",
            metrics.errors.clone(),
        );
        prom.register(
            "watch_resyncs",
            "Count of watches restarted from a zero index",
            metrics.resyncs.clone(),
        );
        prom.register(
            "watch_services",
            "Gauge of the number of services linked to the gateway",
            metrics.services.clone(),
        );
        metrics
    }

    pub(crate) fn updated(&self, kind: &str) {
        self.updates.get_or_create(&KindLabels::new(kind)).inc();
    }

    pub(crate) fn errored(&self, kind: &str) {
        self.errors.get_or_create(&KindLabels::new(kind)).inc();
    }

    pub(crate) fn resynced(&self, kind: &str) {
        self.resyncs.get_or_create(&KindLabels::new(kind)).inc();
    }

    pub(crate) fn set_services(&self, n: usize) {
        self.services.set(n as i64);
    }

    #[cfg(test)]
    pub(crate) fn errors(&self, kind: &str) -> u64 {
        self.errors.get_or_create(&KindLabels::new(kind)).get()
    }

    #[cfg(test)]
    pub(crate) fn resyncs(&self, kind: &str) -> u64 {
        self.resyncs.get_or_create(&KindLabels::new(kind)).get()
    }
}

impl KindLabels {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}
