// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::AggregationService;

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn a periodic trigger. The first run fires immediately; a run that
/// overlaps the next tick delays it instead of stacking up.
pub fn spawn_scheduler(
    service: Arc<AggregationService>,
    cfg: IngestSchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(cfg.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match service.run_with_report().await {
                Ok(report) => {
                    tracing::info!(
                        target: "ingest",
                        persisted = report.persisted.len(),
                        failed_adapters = ?report.failed_adapters,
                        "scheduled ingest tick"
                    );
                }
                Err(e) => {
                    // Surfaced to whoever watches the logs; the next tick retries.
                    counter!("news_ingest_scheduler_failures_total").increment(1);
                    tracing::error!(error = %e, "scheduled ingest run failed");
                }
            }
        }
    })
}
