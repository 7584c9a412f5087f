// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::adapters::{HtmlListingAdapter, HtmlSelectors, RssAdapter};
use crate::ingest::normalize::DEFAULT_TITLE_PREFIXES;
use crate::ingest::types::NewsAdapter;

pub const ENV_PATH: &str = "NEWS_INGEST_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/news_ingest.toml";
pub const DEFAULT_JSON_PATH: &str = "config/news_ingest.json";

fn default_title_prefixes() -> Vec<String> {
    DEFAULT_TITLE_PREFIXES.iter().map(|s| s.to_string()).collect()
}
fn default_max_concurrency() -> usize {
    4
}
fn default_run_timeout_secs() -> u64 {
    60
}
fn default_http_timeout_secs() -> u64 {
    15
}
fn default_true() -> bool {
    true
}

/// One registered source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Rss {
        name: String,
        url: String,
    },
    Html {
        name: String,
        url: String,
        #[serde(flatten)]
        selectors: HtmlSelectors,
    },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Rss { name, .. } | SourceConfig::Html { name, .. } => name,
        }
    }

    /// Build the HTTP-mode adapter for this source.
    pub fn build(&self, http_timeout: Duration) -> Result<Box<dyn NewsAdapter>> {
        let adapter: Box<dyn NewsAdapter> = match self {
            SourceConfig::Rss { name, url } => Box::new(RssAdapter::from_url_with_timeout(
                name.clone(),
                url.clone(),
                http_timeout,
            )),
            SourceConfig::Html {
                name,
                url,
                selectors,
            } => Box::new(
                HtmlListingAdapter::from_url_with_timeout(
                    name.clone(),
                    url,
                    selectors,
                    http_timeout,
                )
                .with_context(|| format!("building html source `{name}`"))?,
            ),
        };
        Ok(adapter)
    }
}

/// Pipeline configuration. Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Leading labels stripped from titles (literal, case-insensitive).
    #[serde(default = "default_title_prefixes")]
    pub title_prefixes: Vec<String>,
    /// Adapters scraped at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for all adapter calls of one run; 0 disables it.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Drop near-duplicate titles from different URLs within a run.
    #[serde(default = "default_true")]
    pub title_similarity: bool,
    /// Scheduler period; absent means trigger-only.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// File-backed seen-set; absent keeps it in memory.
    #[serde(default)]
    pub seen_path: Option<PathBuf>,
    /// JSON news store; absent keeps items in memory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            title_prefixes: default_title_prefixes(),
            max_concurrency: default_max_concurrency(),
            run_timeout_secs: default_run_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            title_similarity: true,
            interval_secs: None,
            seen_path: None,
            store_path: None,
            sources: Vec::new(),
        }
    }
}

impl IngestConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Build every configured adapter in declaration order.
    pub fn build_adapters(&self) -> Result<Vec<Box<dyn NewsAdapter>>> {
        self.sources
            .iter()
            .map(|s| s.build(self.http_timeout()))
            .collect()
    }

    fn sanitize(mut self) -> Result<Self> {
        if self.max_concurrency == 0 {
            self.max_concurrency = 1;
        }
        self.title_prefixes = clean_list(self.title_prefixes);

        let mut names = std::collections::HashSet::new();
        for s in &self.sources {
            if s.name().trim().is_empty() {
                return Err(anyhow!("source with empty name"));
            }
            if !names.insert(s.name().to_ascii_lowercase()) {
                return Err(anyhow!("duplicate source name `{}`", s.name()));
            }
        }
        Ok(self)
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing ingest config {}", path.display()))
}

/// Load configuration using env var + fallbacks:
/// 1) $NEWS_INGEST_CONFIG_PATH
/// 2) config/news_ingest.toml
/// 3) config/news_ingest.json
/// 4) built-in defaults (no sources)
pub fn load_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(IngestConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    let cfg: IngestConfig = match hint_ext {
        "toml" => toml::from_str(s)?,
        "json" => serde_json::from_str(s)?,
        // No usable extension: JSON documents start with `{`.
        _ if s.trim_start().starts_with('{') => serde_json::from_str(s)?,
        _ => toml::from_str(s)?,
    };
    cfg.sanitize()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
