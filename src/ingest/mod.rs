// src/ingest/mod.rs
pub mod adapters;
pub mod config;
pub mod dedup;
pub mod normalize;
pub mod scheduler;
pub mod storage;
pub mod types;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::error::{FetchFailure, PersistenceError, SourceFetchError};
use crate::ingest::dedup::{is_similar_title, Deduplicator, FileSeenSet};
use crate::ingest::normalize::Normalizer;
use crate::ingest::storage::{JsonFileStore, MemoryStore, NewsStore};
use crate::ingest::types::{NewsAdapter, PersistedNewsItem, RawNewsItem};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_ingest_runs_total", "Aggregation runs started.");
        describe_counter!(
            "news_ingest_fetched_total",
            "Raw items returned by adapters."
        );
        describe_counter!(
            "news_ingest_normalize_dropped_total",
            "Items dropped because they could not be normalized."
        );
        describe_counter!(
            "news_ingest_dedup_total",
            "Items dropped as already-seen URLs."
        );
        describe_counter!(
            "news_ingest_title_dedup_total",
            "Items dropped as near-duplicate titles."
        );
        describe_counter!("news_ingest_persisted_total", "Items written to storage.");
        describe_counter!(
            "news_ingest_adapter_errors_total",
            "Adapter scrape failures and timeouts."
        );
        describe_counter!(
            "news_ingest_http_errors_total",
            "HTTP errors while fetching a source."
        );
        describe_counter!(
            "news_ingest_persist_errors_total",
            "Batch writes rejected by storage."
        );
        describe_histogram!("news_ingest_parse_ms", "Adapter parse time in milliseconds.");
        describe_histogram!("news_ingest_run_ms", "Aggregation run time in milliseconds.");
        describe_gauge!(
            "news_ingest_last_run_ts",
            "Unix ts when the aggregation pipeline last ran."
        );
    });
}

/// Knobs for one aggregation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Adapters scraped at the same time (min 1).
    pub max_concurrency: usize,
    /// Shared deadline for every adapter call of a run.
    pub run_timeout: Option<Duration>,
    /// Compare titles of survivors within a run.
    pub title_similarity: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            run_timeout: Some(Duration::from_secs(60)),
            title_similarity: true,
        }
    }
}

/// Counters of one run, returned to whoever triggered it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub adapters: usize,
    pub failed_adapters: Vec<String>,
    pub fetched: usize,
    pub normalize_dropped: usize,
    pub url_duplicates: usize,
    pub title_duplicates: usize,
    pub persisted: Vec<PersistedNewsItem>,
}

/// fetch → normalize → deduplicate → persist, over every registered adapter.
pub struct AggregationService {
    adapters: Vec<Box<dyn NewsAdapter>>,
    normalizer: Normalizer,
    dedup: Deduplicator,
    store: Arc<dyn NewsStore>,
    opts: RunOptions,
    run_lock: tokio::sync::Mutex<()>,
}

impl AggregationService {
    pub fn new(adapters: Vec<Box<dyn NewsAdapter>>, store: Arc<dyn NewsStore>) -> Self {
        Self {
            adapters,
            normalizer: Normalizer::default(),
            dedup: Deduplicator::in_memory(),
            store,
            opts: RunOptions::default(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Wire adapters, seen-set and store from configuration.
    pub fn from_config(cfg: &config::IngestConfig) -> anyhow::Result<Self> {
        let adapters = cfg.build_adapters()?;
        let store: Arc<dyn NewsStore> = match &cfg.store_path {
            Some(p) => Arc::new(JsonFileStore::new(p.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        let dedup = match &cfg.seen_path {
            Some(p) => Deduplicator::with_store(FileSeenSet::open(p)?),
            None => Deduplicator::in_memory(),
        };
        Ok(Self::new(adapters, store)
            .with_normalizer(Normalizer::new(&cfg.title_prefixes))
            .with_deduplicator(dedup)
            .with_options(RunOptions {
                max_concurrency: cfg.max_concurrency,
                run_timeout: cfg.run_timeout(),
                title_similarity: cfg.title_similarity,
            }))
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_deduplicator(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_options(mut self, opts: RunOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn store(&self) -> &Arc<dyn NewsStore> {
        &self.store
    }

    /// Run once and return what was persisted.
    pub async fn run(&self) -> Result<Vec<PersistedNewsItem>, PersistenceError> {
        self.run_with_report().await.map(|r| r.persisted)
    }

    pub async fn run_with_report(&self) -> Result<RunReport, PersistenceError> {
        ensure_metrics_described();
        let _serial = self.run_lock.lock().await;

        let started_at = chrono::Utc::now();
        let t0 = Instant::now();
        counter!("news_ingest_runs_total").increment(1);

        // 1) + 2) fan out, join in registration order
        let (raw, failed_adapters) = self.fetch_all().await;
        let fetched = raw.len();
        counter!("news_ingest_fetched_total").increment(fetched as u64);

        let mut normalize_dropped = 0usize;
        let mut url_duplicates = 0usize;
        let mut title_duplicates = 0usize;
        // Released on drop unless committed after a successful write, so a
        // failed or cancelled run leaves nothing marked as seen.
        let mut claims = self.dedup.begin();
        let mut accepted: Vec<PersistedNewsItem> = Vec::new();

        for item in raw {
            // 3) normalize
            let item = match self.normalizer.normalize(item) {
                Ok(it) => it,
                Err(e) => {
                    tracing::warn!(error = %e, "normalization failed, item dropped");
                    normalize_dropped += 1;
                    continue;
                }
            };

            // 4) URL identity, check-and-set
            let Some(hash) = claims.claim(&item) else {
                tracing::debug!(url = item.url(), source = item.source(), "duplicate url");
                url_duplicates += 1;
                continue;
            };

            if self.opts.title_similarity {
                if let Some(prev) = accepted
                    .iter()
                    .find(|p| is_similar_title(p.title(), item.title()))
                {
                    tracing::debug!(
                        title = item.title(),
                        kept = prev.title(),
                        kept_source = prev.item.source(),
                        "near-duplicate title"
                    );
                    title_duplicates += 1;
                    continue;
                }
            }

            accepted.push(PersistedNewsItem {
                item,
                url_hash: hash,
            });
        }

        counter!("news_ingest_normalize_dropped_total").increment(normalize_dropped as u64);
        counter!("news_ingest_dedup_total").increment(url_duplicates as u64);
        counter!("news_ingest_title_dedup_total").increment(title_duplicates as u64);

        // 5) one batch
        if !accepted.is_empty() {
            if let Err(e) = self.store.upsert_batch(&accepted).await {
                counter!("news_ingest_persist_errors_total").increment(1);
                claims.release();
                tracing::error!(
                    error = ?e,
                    store = self.store.name(),
                    items = accepted.len(),
                    "persisting news batch failed"
                );
                return Err(PersistenceError {
                    store: self.store.name().to_string(),
                    item_count: accepted.len(),
                    source: e,
                });
            }
        }
        claims.commit();
        counter!("news_ingest_persisted_total").increment(accepted.len() as u64);

        let elapsed = t0.elapsed();
        histogram!("news_ingest_run_ms").record(elapsed.as_secs_f64() * 1_000.0);
        gauge!("news_ingest_last_run_ts").set(started_at.timestamp().max(0) as f64);

        tracing::info!(
            target: "ingest",
            adapters = self.adapters.len(),
            failed = failed_adapters.len(),
            fetched,
            normalize_dropped,
            url_duplicates,
            title_duplicates,
            persisted = accepted.len(),
            "aggregation run finished"
        );

        // 6)
        Ok(RunReport {
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            adapters: self.adapters.len(),
            failed_adapters,
            fetched,
            normalize_dropped,
            url_duplicates,
            title_duplicates,
            persisted: accepted,
        })
    }

    /// Scrape every adapter with bounded concurrency. Failures, panics and
    /// timeouts contribute nothing; output keeps registration order.
    async fn fetch_all(&self) -> (Vec<RawNewsItem>, Vec<String>) {
        let deadline = self
            .opts
            .run_timeout
            .map(|t| tokio::time::Instant::now() + t);

        let calls: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| scrape_one(adapter.as_ref(), deadline))
            .collect();
        let results: Vec<Result<Vec<RawNewsItem>, SourceFetchError>> = stream::iter(calls)
            .buffered(self.opts.max_concurrency.max(1))
            .collect()
            .await;

        let mut raw = Vec::new();
        let mut failed = Vec::new();
        for res in results {
            match res {
                Ok(mut items) => raw.append(&mut items),
                Err(e) => {
                    tracing::warn!(error = %e, adapter = %e.adapter, "adapter error");
                    counter!("news_ingest_adapter_errors_total", "adapter" => e.adapter.clone())
                        .increment(1);
                    failed.push(e.adapter);
                }
            }
        }
        (raw, failed)
    }
}

async fn scrape_one(
    adapter: &dyn NewsAdapter,
    deadline: Option<tokio::time::Instant>,
) -> Result<Vec<RawNewsItem>, SourceFetchError> {
    let call = AssertUnwindSafe(adapter.scrape()).catch_unwind();
    let outcome = match deadline {
        Some(d) => match tokio::time::timeout_at(d, call).await {
            Ok(res) => flatten_scrape(res),
            Err(_) => Err(FetchFailure::TimedOut),
        },
        None => flatten_scrape(call.await),
    };
    outcome
        .map(|items| {
            tracing::debug!(adapter = adapter.name(), items = items.len(), "adapter scraped");
            items
        })
        .map_err(|kind| SourceFetchError {
            adapter: adapter.name().to_string(),
            kind,
        })
}

fn flatten_scrape(
    res: Result<anyhow::Result<Vec<RawNewsItem>>, Box<dyn Any + Send>>,
) -> Result<Vec<RawNewsItem>, FetchFailure> {
    match res {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(FetchFailure::Failed(e)),
        Err(payload) => Err(FetchFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
