// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod error;
pub mod ingest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{FetchFailure, NormalizationError, PersistenceError, SourceFetchError};
pub use crate::ingest::types::{NewsAdapter, NormalizedNewsItem, PersistedNewsItem, RawNewsItem};
pub use crate::ingest::{AggregationService, RunOptions, RunReport};
