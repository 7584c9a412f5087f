//! Prometheus recorder for the `news_ingest_*` series. The `/metrics` route
//! itself lives in [`crate::api`].

use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global recorder and publish how many sources are registered.
/// Fails if a recorder is already installed in this process.
pub fn install(sources: usize) -> anyhow::Result<PrometheusHandle> {
    // Default buckets; histograms render as summaries.
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

    describe_gauge!("news_ingest_sources", "News sources registered at startup.");
    gauge!("news_ingest_sources").set(sources as f64);

    Ok(handle)
}
