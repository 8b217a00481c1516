use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global `metrics` recorder and return the handle that renders
/// the Prometheus exposition text.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
}
