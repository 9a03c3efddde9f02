//! Prometheus metrics for collection and prediction cycles.
//!
//! Recording goes through the [`metrics`] facade, so nothing is exported
//! until [`MetricsHandle::install`] registers the Prometheus recorder.
//! `GET /metrics` renders the handle in the text exposition format.

use std::fmt;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::scheduler::Trigger;

/// Counter of finished cycles, labelled by `cycle`, `trigger` and `outcome`.
pub const CYCLES_TOTAL: &str = "bikeshare_cycles_total";

/// Histogram of cycle wall time in seconds, labelled by `cycle` and `outcome`.
pub const CYCLE_DURATION_SECONDS: &str = "bikeshare_cycle_duration_seconds";

/// Counter of feed records dropped by validation.
pub const SKIPPED_RECORDS_TOTAL: &str = "bikeshare_skipped_records_total";

/// Outcome label of a successful cycle. Failures use the failing stage.
pub const SUCCESS: &str = "success";

/// Renders the recorded metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    inner: PrometheusHandle,
}

impl MetricsHandle {
    /// Installs the Prometheus recorder as the process-wide recorder.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if a global recorder is already installed.
    pub fn install() -> Result<Self, BuildError> {
        let inner = PrometheusBuilder::new().install_recorder()?;
        Ok(Self { inner })
    }

    /// Prometheus text exposition of everything recorded so far.
    #[must_use]
    pub fn render(&self) -> String {
        self.inner.render()
    }
}

impl From<PrometheusHandle> for MetricsHandle {
    fn from(inner: PrometheusHandle) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsHandle").finish_non_exhaustive()
    }
}

/// Counts one finished cycle and records how long it took.
pub fn record_cycle(cycle: &'static str, trigger: Trigger, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        CYCLES_TOTAL,
        "cycle" => cycle,
        "trigger" => trigger.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(CYCLE_DURATION_SECONDS, "cycle" => cycle, "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Adds `count` dropped feed records.
pub fn record_skipped(count: usize) {
    if count > 0 {
        metrics::counter!(SKIPPED_RECORDS_TOTAL).increment(count as u64);
    }
}
