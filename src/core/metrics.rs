use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

/// Counts one classification run and records its wall time.
pub(crate) fn record_run(scope: &'static str, status: &'static str, elapsed: Duration) {
    metrics::counter!("classification_runs_total", "scope" => scope, "status" => status)
        .increment(1);
    metrics::histogram!("classification_duration_seconds", "scope" => scope)
        .record(elapsed.as_secs_f64());
}

pub(crate) fn record_dropped_rows(count: usize) {
    if count > 0 {
        metrics::counter!("classification_rows_dropped_total").increment(count as u64);
    }
}
