use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Installs the global prometheus recorder. The returned handle renders the
/// current values in the text exposition format.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    // Milliseconds for flush timings, rows for batch sizes
    const BUCKETS: &[f64] = &[
        1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(BUCKETS)?
        .install_recorder()
}

/// Records the time between creation and drop, in milliseconds, as a histogram
/// entry.
pub struct TimingGuard {
    name: &'static str,
    labels: Vec<(&'static str, String)>,
    start: Instant,
}

pub fn timing_guard(name: &'static str) -> TimingGuard {
    TimingGuard {
        name,
        labels: Vec::new(),
        start: Instant::now(),
    }
}

impl TimingGuard {
    pub fn label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }

    // Makes the end of the timed section explicit at the call site
    pub fn fin(self) {}
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        metrics::histogram!(self.name, &self.labels)
            .record(self.start.elapsed().as_millis() as f64);
    }
}
