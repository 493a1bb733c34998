//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Snapshots stored.
pub const SNAPSHOTS_SAVED: &str = "callsnap_snapshots_saved_total";
/// Failed save attempts.
pub const SNAPSHOT_SAVE_FAILURES: &str = "callsnap_snapshot_save_failures_total";
/// List calls, labelled by outcome.
pub const SNAPSHOT_LISTS: &str = "callsnap_snapshot_list_total";
/// Error responses, labelled by route.
pub const HTTP_ERRORS: &str = "callsnap_http_errors_total";

/// Installs the Prometheus recorder and its scrape listener.
///
/// Returns `None` when metrics are disabled; the `metrics` macros are no-ops
/// without a recorder. Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if no runtime is running, the exporter cannot be built,
/// or a recorder is already installed.
pub fn install_prometheus(settings: &MetricsSettings) -> Result<Option<PrometheusHandle>> {
    if !settings.enabled {
        return Ok(None);
    }

    let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::OperationFailed {
        operation: "metrics_runtime".to_string(),
        cause: e.to_string(),
    })?;

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), settings.port);
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    let (recorder, exporter) = {
        let _guard = runtime.enter();
        builder.build().map_err(|e| Error::OperationFailed {
            operation: "metrics_exporter_build".to_string(),
            cause: e.to_string(),
        })?
    };
    let handle = recorder.handle();
    set_global_recorder(recorder)?;
    runtime.spawn(exporter);

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(Some(handle))
}

fn set_global_recorder(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder).map_err(|e| Error::OperationFailed {
        operation: "metrics_recorder_install".to_string(),
        cause: e.to_string(),
    })
}
