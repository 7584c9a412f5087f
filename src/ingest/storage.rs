// src/ingest/storage.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::ingest::types::PersistedNewsItem;

/// Persistence collaborator for accepted news items.
#[async_trait::async_trait]
pub trait NewsStore: Send + Sync {
    /// Upsert the whole batch keyed by URL. Success or failure applies to the batch as a whole.
    async fn upsert_batch(&self, items: &[PersistedNewsItem]) -> Result<()>;
    fn name(&self) -> &str;
}

/// Insertion-ordered in-memory store. Re-upserting a URL replaces the item in place.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    items: Vec<PersistedNewsItem>,
    by_url: HashMap<String, usize>,
    batches: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<PersistedNewsItem> {
        self.inner.lock().expect("store mutex poisoned").items.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `upsert_batch` calls seen so far.
    pub fn batches(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").batches
    }
}

#[async_trait::async_trait]
impl NewsStore for MemoryStore {
    async fn upsert_batch(&self, items: &[PersistedNewsItem]) -> Result<()> {
        let mut state = self.inner.lock().expect("store mutex poisoned");
        state.batches += 1;
        for it in items {
            match state.by_url.get(it.url()).copied() {
                Some(idx) => state.items[idx] = it.clone(),
                None => {
                    let idx = state.items.len();
                    state.by_url.insert(it.url().to_string(), idx);
                    state.items.push(it.clone());
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// JSON array on disk, merged by URL on every batch.
///
/// The file is rewritten through a sibling temp file and renamed into place so
/// a crash mid-write never leaves a truncated document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read everything currently stored. A missing file reads as empty.
    pub async fn load(&self) -> Result<Vec<PersistedNewsItem>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(Vec::new()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing news store {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading news store {}", self.path.display())),
        }
    }
}

#[async_trait::async_trait]
impl NewsStore for JsonFileStore {
    async fn upsert_batch(&self, items: &[PersistedNewsItem]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.load().await?;
        let mut by_url: HashMap<String, usize> = all
            .iter()
            .enumerate()
            .map(|(i, it)| (it.url().to_string(), i))
            .collect();
        for it in items {
            match by_url.get(it.url()).copied() {
                Some(idx) => all[idx] = it.clone(),
                None => {
                    by_url.insert(it.url().to_string(), all.len());
                    all.push(it.clone());
                }
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating store dir {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&all).context("serializing news store")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        tracing::debug!(
            path = %self.path.display(),
            batch = items.len(),
            total = all.len(),
            "news store updated"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::dedup::url_hash;
    use crate::ingest::normalize::normalize;
    use crate::ingest::types::RawNewsItem;

    fn persisted(title: &str, url: &str) -> PersistedNewsItem {
        PersistedNewsItem {
            item: normalize(RawNewsItem::new(title, url, "FilmFeed")).unwrap(),
            url_hash: url_hash(url),
        }
    }

    #[tokio::test]
    async fn memory_store_upserts_by_url_in_place() {
        let store = MemoryStore::new();
        store
            .upsert_batch(&[persisted("A", "https://x/1"), persisted("B", "https://x/2")])
            .await
            .unwrap();
        store
            .upsert_batch(&[persisted("A v2", "https://x/1")])
            .await
            .unwrap();

        let items = store.snapshot();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), "A v2");
        assert_eq!(items[1].title(), "B");
        assert_eq!(store.batches(), 2);
    }

    #[tokio::test]
    async fn json_store_merges_batches_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data/news.json"));
        assert!(store.load().await.unwrap().is_empty());

        store
            .upsert_batch(&[persisted("A", "https://x/1")])
            .await
            .unwrap();
        store
            .upsert_batch(&[persisted("B", "https://x/2"), persisted("A v2", "https://x/1")])
            .await
            .unwrap();

        let items = store.load().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), "A v2");
        assert_eq!(items[1].url_hash, url_hash("https://x/2"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"urlHash\""));
        assert!(raw.contains("\"publishedAt\""));
    }
}
