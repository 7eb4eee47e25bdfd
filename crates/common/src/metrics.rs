use std::sync::{Arc, OnceLock};

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    query_time_seconds: HistogramVec,
    query_runs: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// One timed iteration of a query template.
    pub fn record_query_run(&self, query_number: u32, scope: &str, secs: f64) {
        let query = query_number.to_string();
        self.inner
            .query_time_seconds
            .with_label_values(&[query.as_str(), scope])
            .observe(secs.max(0.0));
        self.inner
            .query_runs
            .with_label_values(&[query.as_str(), "ok"])
            .inc();
    }

    pub fn record_query_failure(&self, query_number: u32) {
        let query = query_number.to_string();
        self.inner
            .query_runs
            .with_label_values(&[query.as_str(), "failed"])
            .inc();
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let query_time_seconds = histogram_vec(
            &registry,
            "fdq_query_time_seconds",
            "Wall-clock time of one benchmark query iteration",
            &["query_number", "scope"],
        );
        let query_runs = counter_vec(
            &registry,
            "fdq_query_runs_total",
            "Benchmark query iterations by outcome",
            &["query_number", "status"],
        );

        Self {
            registry,
            query_time_seconds,
            query_runs,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}
