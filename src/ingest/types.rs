// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One item as an adapter scraped it. Lives only for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawNewsItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub published_at: String, // as published by the source, not reparsed
    pub source: String,       // adapter name
    #[serde(default)]
    pub description: Option<String>,
}

impl RawNewsItem {
    /// Minimal item with only the identifying fields set.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            image_url: None,
            published_at: String::new(),
            source: source.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = published_at.into();
        self
    }
}

/// Canonical item produced by the normalizer.
///
/// Title, url and description are always non-empty. Fields are private so the
/// only way to obtain one is [`crate::ingest::normalize::Normalizer::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNewsItem {
    title: String,
    url: String,
    image_url: Option<String>,
    published_at: String,
    source: String,
    description: String,
}

impl NormalizedNewsItem {
    pub(crate) fn from_parts(
        title: String,
        url: String,
        image_url: Option<String>,
        published_at: String,
        source: String,
        description: String,
    ) -> Self {
        Self {
            title,
            url,
            image_url,
            published_at,
            source,
            description,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn published_at(&self) -> &str {
        &self.published_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A normalized item accepted by a run and handed to storage, keyed by `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNewsItem {
    #[serde(flatten)]
    pub item: NormalizedNewsItem,
    pub url_hash: String,
}

impl PersistedNewsItem {
    pub fn url(&self) -> &str {
        self.item.url()
    }

    pub fn title(&self) -> &str {
        self.item.title()
    }
}

/// A single news source. Configuration (name, base URL) is fixed at construction.
///
/// Implementations report failures as errors; the aggregation service contains
/// them so one broken source never blocks the others.
#[async_trait::async_trait]
pub trait NewsAdapter: Send + Sync {
    async fn scrape(&self) -> Result<Vec<RawNewsItem>>;
    fn name(&self) -> &str;
    fn base_url(&self) -> &str;
}
