// src/ingest/dedup.rs
//! URL identity and near-duplicate title detection.
//!
//! - [`url_hash`]: 128-bit SHA-256 prefix of the URL, hex encoded.
//! - [`Deduplicator::is_duplicate`]: check-and-set against a [`SeenStore`].
//!   The first sighting of a URL claims it and returns `false`, every later
//!   sighting returns `true` without touching state.
//! - [`ClaimBatch`]: the same check-and-set for a whole run, made permanent
//!   only after the run's batch reached storage.
//! - [`is_similar_title`]: permissive token-set comparison for syndicated reposts
//!   that live under different URLs.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::ingest::types::NormalizedNewsItem;

/// Deterministic identity hash of a URL.
pub fn url_hash(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Whitespace tokens sorted alphabetically and rejoined with single spaces.
fn sorted_tokens(title: &str) -> String {
    let mut tokens: Vec<&str> = title.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// True if the sorted token string of one title contains the other's.
/// Case-sensitive; an empty title is never similar to anything.
pub fn is_similar_title(a: &str, b: &str) -> bool {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Backing set for claimed URL hashes.
///
/// A hash is first reserved with `claim`, then made durable with `commit`
/// once the items behind it reached storage. `claim` must be atomic: two
/// concurrent callers with the same hash see exactly one `true`.
pub trait SeenStore: Send + Sync {
    /// Reserve `hash`. Returns `true` if it was neither reserved nor committed.
    fn claim(&self, hash: &str) -> bool;
    /// Make reserved hashes durable. Hashes no longer reserved are ignored.
    fn commit(&self, hashes: &[String]);
    /// Forget hashes, reserved or committed, in a single pass.
    fn remove_many(&self, hashes: &[String]);
    fn contains(&self, hash: &str) -> bool;
    fn len(&self) -> usize;

    fn remove(&self, hash: &str) {
        self.remove_many(&[hash.to_string()]);
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime seen-set. Commit is a no-op.
#[derive(Debug, Default)]
pub struct MemorySeenSet {
    inner: Mutex<HashSet<String>>,
}

impl MemorySeenSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeenStore for MemorySeenSet {
    fn claim(&self, hash: &str) -> bool {
        let mut set = self.inner.lock().expect("seen-set mutex poisoned");
        set.insert(hash.to_string())
    }

    fn commit(&self, _hashes: &[String]) {}

    fn remove_many(&self, hashes: &[String]) {
        let mut set = self.inner.lock().expect("seen-set mutex poisoned");
        for h in hashes {
            set.remove(h);
        }
    }

    fn contains(&self, hash: &str) -> bool {
        let set = self.inner.lock().expect("seen-set mutex poisoned");
        set.contains(hash)
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("seen-set mutex poisoned").len()
    }
}

/// Seen-set persisted as one hash per line, so dedup survives restarts.
///
/// Only committed hashes reach the file: a process that dies between claim
/// and commit retries those items after restart. Commits append, removal of
/// committed hashes rewrites the file once. Write failures are logged and the
/// in-memory state stays authoritative for the rest of the process.
#[derive(Debug)]
pub struct FileSeenSet {
    path: PathBuf,
    inner: Mutex<FileSeenState>,
}

#[derive(Debug)]
struct FileSeenState {
    /// reserved + committed
    set: HashSet<String>,
    /// what the file holds
    durable: HashSet<String>,
    file: File,
}

impl FileSeenSet {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating seen-set dir {}", parent.display()))?;
        }

        let durable: HashSet<String> = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading seen-set {}", path.display()))
            }
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening seen-set {}", path.display()))?;

        tracing::debug!(path = %path.display(), hashes = durable.len(), "seen-set loaded");

        Ok(Self {
            path,
            inner: Mutex::new(FileSeenState {
                set: durable.clone(),
                durable,
                file,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&self, state: &mut FileSeenState) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            for h in &state.durable {
                writeln!(f, "{h}")?;
            }
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        state.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

impl SeenStore for FileSeenSet {
    fn claim(&self, hash: &str) -> bool {
        let mut state = self.inner.lock().expect("seen-set mutex poisoned");
        state.set.insert(hash.to_string())
    }

    fn commit(&self, hashes: &[String]) {
        let mut state = self.inner.lock().expect("seen-set mutex poisoned");
        let FileSeenState { set, durable, file } = &mut *state;
        let mut lines = String::new();
        for h in hashes {
            if set.contains(h) && durable.insert(h.clone()) {
                lines.push_str(h);
                lines.push('\n');
            }
        }
        if lines.is_empty() {
            return;
        }
        if let Err(e) = file.write_all(lines.as_bytes()).and_then(|_| file.flush()) {
            tracing::warn!(error = ?e, path = %self.path.display(), "seen-set append failed");
        }
    }

    fn remove_many(&self, hashes: &[String]) {
        let mut state = self.inner.lock().expect("seen-set mutex poisoned");
        let mut touched_file = false;
        for h in hashes {
            state.set.remove(h);
            touched_file |= state.durable.remove(h);
        }
        if touched_file {
            if let Err(e) = self.rewrite(&mut state) {
                tracing::warn!(error = ?e, path = %self.path.display(), "seen-set rewrite failed");
            }
        }
    }

    fn contains(&self, hash: &str) -> bool {
        let state = self.inner.lock().expect("seen-set mutex poisoned");
        state.set.contains(hash)
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("seen-set mutex poisoned").set.len()
    }
}

/// Sole owner of the seen-set.
pub struct Deduplicator {
    seen: Box<dyn SeenStore>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("seen", &self.seen.len())
            .finish()
    }
}

impl Deduplicator {
    pub fn in_memory() -> Self {
        Self::with_store(MemorySeenSet::new())
    }

    pub fn with_store<S: SeenStore + 'static>(store: S) -> Self {
        Self {
            seen: Box::new(store),
        }
    }

    /// Check-and-set on the item's URL hash, committed immediately.
    pub fn is_duplicate(&self, item: &NormalizedNewsItem) -> bool {
        let hash = url_hash(item.url());
        if !self.seen.claim(&hash) {
            return true;
        }
        self.seen.commit(&[hash]);
        false
    }

    /// Start a set of claims that only count as seen once committed.
    pub fn begin(&self) -> ClaimBatch<'_> {
        ClaimBatch {
            seen: self.seen.as_ref(),
            hashes: Vec::new(),
        }
    }

    /// Read-only membership check.
    pub fn has_seen(&self, url: &str) -> bool {
        self.seen.contains(&url_hash(url))
    }

    /// Forget hashes, e.g. ones whose items were later removed from storage.
    pub fn release<I, S>(&self, hashes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hashes: Vec<String> = hashes.into_iter().map(|h| h.as_ref().to_string()).collect();
        if !hashes.is_empty() {
            self.seen.remove_many(&hashes);
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// URL claims made by one aggregation run.
///
/// Claims block other sightings of the same URL right away, but become
/// permanent only through [`ClaimBatch::commit`]. Dropping the batch without
/// committing (error, cancelled future) releases every claim.
pub struct ClaimBatch<'a> {
    seen: &'a dyn SeenStore,
    hashes: Vec<String>,
}

impl ClaimBatch<'_> {
    /// Claim the item's URL. Returns its hash if the URL was new, `None` for
    /// a duplicate.
    pub fn claim(&mut self, item: &NormalizedNewsItem) -> Option<String> {
        let hash = url_hash(item.url());
        if !self.seen.claim(&hash) {
            return None;
        }
        self.hashes.push(hash.clone());
        Some(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn commit(mut self) {
        let hashes = std::mem::take(&mut self.hashes);
        self.seen.commit(&hashes);
    }

    pub fn release(self) {}
}

impl Drop for ClaimBatch<'_> {
    fn drop(&mut self) {
        if !self.hashes.is_empty() {
            tracing::debug!(claims = self.hashes.len(), "releasing uncommitted url claims");
            self.seen.remove_many(&self.hashes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::normalize;
    use crate::ingest::types::RawNewsItem;

    fn item(title: &str, url: &str) -> NormalizedNewsItem {
        normalize(RawNewsItem::new(title, url, "FilmFeed")).unwrap()
    }

    #[test]
    fn hash_is_stable_hex_128() {
        let h = url_hash("https://a.com/1");
        assert_eq!(h, url_hash("https://a.com/1"));
        assert_eq!(h.len(), 32);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h, url_hash("https://a.com/2"));
    }

    #[test]
    fn second_sighting_is_duplicate() {
        let d = Deduplicator::in_memory();
        assert!(!d.is_duplicate(&item("Devara Update", "https://a.com/1")));
        assert!(d.is_duplicate(&item("Something else", "https://a.com/1")));
        assert_eq!(d.seen_count(), 1);
    }

    #[test]
    fn release_makes_url_new_again() {
        let d = Deduplicator::in_memory();
        let it = item("Devara Update", "https://a.com/1");
        assert!(!d.is_duplicate(&it));
        d.release([url_hash(it.url())]);
        assert!(!d.has_seen(it.url()));
        assert!(!d.is_duplicate(&it));
    }

    #[test]
    fn similar_titles_ignore_token_order() {
        assert!(is_similar_title(
            "Devara Release Date Out",
            "Release Date Out Devara"
        ));
        assert!(!is_similar_title("Devara Update", "Pushpa Update"));
    }

    #[test]
    fn similar_titles_match_on_containment() {
        assert!(is_similar_title("Devara Update", "Big Devara Update"));
        assert!(is_similar_title("  Devara   Update ", "Devara Update"));
    }

    #[test]
    fn empty_title_is_never_similar() {
        assert!(!is_similar_title("", "Devara Update"));
        assert!(!is_similar_title("   ", ""));
    }

    fn hashes(hs: &[&str]) -> Vec<String> {
        hs.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn committed_claims_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/seen.txt");
        {
            let s = FileSeenSet::open(&path).unwrap();
            assert!(s.claim("abc"));
            assert!(s.claim("def"));
            assert!(!s.claim("abc"));
            s.commit(&hashes(&["abc", "def"]));
        }
        let s = FileSeenSet::open(&path).unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.contains("def"));

        s.remove("abc");
        drop(s);
        let s = FileSeenSet::open(&path).unwrap();
        assert!(!s.contains("abc"));
        assert!(s.claim("ghi"));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn uncommitted_claims_never_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");
        {
            let s = FileSeenSet::open(&path).unwrap();
            assert!(s.claim("abc"));
            assert!(s.contains("abc"));
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(FileSeenSet::open(&path).unwrap().is_empty());
    }

    #[test]
    fn remove_many_rewrites_once_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");
        let s = FileSeenSet::open(&path).unwrap();
        for h in ["a1", "b2", "c3"] {
            s.claim(h);
        }
        s.commit(&hashes(&["a1", "b2", "c3"]));
        s.claim("d4");

        s.remove_many(&hashes(&["a1", "c3", "d4"]));
        assert_eq!(s.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "b2");
    }

    #[test]
    fn dropped_batch_releases_its_claims() {
        let d = Deduplicator::in_memory();
        let it = item("Devara Update", "https://a.com/1");
        {
            let mut batch = d.begin();
            assert_eq!(batch.claim(&it), Some(url_hash(it.url())));
            assert_eq!(batch.claim(&it), None);
            assert!(d.has_seen(it.url()));
        }
        assert!(!d.has_seen(it.url()));

        let mut batch = d.begin();
        assert!(batch.claim(&it).is_some());
        batch.commit();
        assert!(d.has_seen(it.url()));
        assert!(d.is_duplicate(&it));
    }
}
