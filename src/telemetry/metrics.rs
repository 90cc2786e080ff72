//! Run metrics
//!
//! Recorded through the `metrics` facade; they go nowhere until a recorder
//! is installed with [`install_prometheus`].

use crate::loader::RejectReason;
use crate::store::QueryKind;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use std::time::Duration;

/// Metric names
#[derive(Debug, Clone, Copy)]
pub enum Metric {
    /// Per-iteration query latency, labelled by layout and query
    QueryLatency,
    /// On-disk footprint, labelled by layout
    StoreBytes,
    /// Rows dropped by validation, labelled by reason
    RowsRejected,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::QueryLatency => "ohlcv_query_latency_ms",
            Metric::StoreBytes => "ohlcv_store_bytes",
            Metric::RowsRejected => "ohlcv_rows_rejected_total",
        }
    }
}

/// Record one timed query execution
pub fn record_query_latency(layout: &'static str, kind: QueryKind, duration: Duration) {
    metrics::histogram!(Metric::QueryLatency.name(), "layout" => layout, "query" => kind.name())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Set the on-disk size of a layout
pub fn set_store_bytes(layout: &'static str, bytes: u64) {
    metrics::gauge!(Metric::StoreBytes.name(), "layout" => layout).set(bytes as f64);
}

/// Count rejected rows
pub fn record_rejected(reason: RejectReason, count: u64) {
    metrics::counter!(Metric::RowsRejected.name(), "reason" => reason.as_str()).increment(count);
}

/// Install the process-wide Prometheus recorder
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))
}

/// Render the current metrics in Prometheus text format to `path`
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, handle.render())?;
    tracing::info!(path = %path.display(), "Wrote metrics snapshot");
    Ok(())
}
