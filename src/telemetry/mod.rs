//! Telemetry module
//!
//! Logging and run metrics

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use self::metrics::{
    install_prometheus, record_query_latency, record_rejected, set_store_bytes, write_snapshot,
    Metric,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;

/// Guard that writes the metrics snapshot, if one was configured, on drop
pub struct TelemetryGuard {
    snapshot: Option<(PrometheusHandle, PathBuf)>,
}

impl TelemetryGuard {
    /// Write the snapshot now instead of on drop
    pub fn flush(&mut self) -> anyhow::Result<()> {
        if let Some((handle, path)) = self.snapshot.take() {
            write_snapshot(&handle, &path)?;
        }
        Ok(())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to write metrics snapshot");
        }
    }
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format.into())?;

    let snapshot = match &config.metrics_snapshot {
        Some(path) => Some((install_prometheus()?, path.clone())),
        None => None,
    };

    Ok(TelemetryGuard { snapshot })
}
