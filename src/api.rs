//! Admin trigger surface for the ingest pipeline.
//!
//! - `GET  /health`             → `OK`
//! - `POST /admin/ingest/run`   → run now, JSON summary (500 on storage failure)
//! - `GET  /admin/ingest/last`  → last summary or `null`
//! - `GET  /metrics`            → Prometheus text (404 when no recorder is attached)

use std::sync::{Arc, RwLock};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::ingest::{AggregationService, RunReport};

#[derive(Clone)]
pub struct AppState {
    service: Arc<AggregationService>,
    last: Arc<RwLock<Option<RunSummary>>>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<AggregationService>) -> Self {
        Self {
            service,
            last: Arc::new(RwLock::new(None)),
            metrics: None,
        }
    }

    /// Serve this recorder's snapshot on `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub duration_ms: u64,
    pub adapters: usize,
    pub failed_adapters: Vec<String>,
    pub fetched: usize,
    pub normalize_dropped: usize,
    pub url_duplicates: usize,
    pub title_duplicates: usize,
    pub persisted: usize,
    pub titles: Vec<String>,
}

impl From<&RunReport> for RunSummary {
    fn from(r: &RunReport) -> Self {
        Self {
            started_at: r.started_at.to_rfc3339(),
            duration_ms: r.duration_ms,
            adapters: r.adapters,
            failed_adapters: r.failed_adapters.clone(),
            fetched: r.fetched,
            normalize_dropped: r.normalize_dropped,
            url_duplicates: r.url_duplicates,
            title_duplicates: r.title_duplicates,
            persisted: r.persisted.len(),
            titles: r.persisted.iter().map(|p| p.title().to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/admin/ingest/run", post(run_now))
        .route("/admin/ingest/last", get(last_run))
        .route("/metrics", get(render_metrics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn run_now(
    State(state): State<AppState>,
) -> Result<Json<RunSummary>, (StatusCode, Json<ErrorOut>)> {
    match state.service.run_with_report().await {
        Ok(report) => {
            let summary = RunSummary::from(&report);
            if let Ok(mut w) = state.last.write() {
                *w = Some(summary.clone());
            }
            Ok(Json(summary))
        }
        Err(e) => {
            tracing::error!(error = %e, "triggered ingest run failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorOut {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

async fn last_run(State(state): State<AppState>) -> Json<Option<RunSummary>> {
    let last = state.last.read().ok().and_then(|g| g.clone());
    Json(last)
}

async fn render_metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(StatusCode::NOT_FOUND)
}
