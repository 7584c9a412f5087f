//! Film news aggregator: binary entrypoint.
//! Boots the Axum admin router, the optional ingest scheduler and `/metrics`.

use std::sync::Arc;

use anyhow::Context as _;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use film_news_aggregator::api::{self, AppState};
use film_news_aggregator::ingest::config::load_config_default;
use film_news_aggregator::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use film_news_aggregator::ingest::AggregationService;
use film_news_aggregator::metrics;

/// Compact logs by default, JSON lines with NEWS_INGEST_LOG_JSON=1.
/// RUST_LOG overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("film_news_aggregator=info,ingest=info,warn"));

    let json = std::env::var("NEWS_INGEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    // Shuttle may have installed a subscriber already; keep theirs in that case.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = load_config_default().context("loading ingest config")?;
    let service =
        Arc::new(AggregationService::from_config(&cfg).context("building ingest pipeline")?);
    tracing::info!(sources = ?service.adapter_names(), "ingest pipeline ready");

    if let Some(interval_secs) = cfg.interval_secs {
        spawn_scheduler(service.clone(), IngestSchedulerCfg { interval_secs });
    }

    let mut state = AppState::new(service);
    match metrics::install(cfg.sources.len()) {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(api::router(state).into())
}
