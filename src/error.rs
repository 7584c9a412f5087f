//! Error types for the ingest pipeline.
//!
//! Source and normalization failures are recovered inside a run; only
//! [`PersistenceError`] reaches the caller of `run()`.

use thiserror::Error;

/// One adapter's scrape failed or ran past the run deadline.
#[derive(Error, Debug)]
#[error("source `{adapter}` failed: {kind}")]
pub struct SourceFetchError {
    pub adapter: String,
    pub kind: FetchFailure,
}

#[derive(Error, Debug)]
pub enum FetchFailure {
    /// Network, HTTP status or parse error reported by the adapter
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// The adapter panicked while scraping
    #[error("panicked: {0}")]
    Panicked(String),

    /// The shared run deadline elapsed before the adapter returned
    #[error("timed out")]
    TimedOut,
}

/// A raw item could not be turned into a valid normalized item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("title is empty after normalization (url: {url})")]
    EmptyTitle { url: String },

    #[error("item has no url (title: {title})")]
    MissingUrl { title: String },
}

/// The batch write to storage failed. Fatal to the run.
#[derive(Error, Debug)]
#[error("storage `{store}` rejected batch of {item_count} items: {source:#}")]
pub struct PersistenceError {
    pub store: String,
    pub item_count: usize,
    #[source]
    pub source: anyhow::Error,
}
