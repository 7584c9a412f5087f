// src/ingest/adapters/fixture.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::ingest::types::{NewsAdapter, RawNewsItem};

/// Adapter returning a fixed list, for hand-curated sources and tests.
pub struct FixtureAdapter {
    name: String,
    base_url: String,
    outcome: Outcome,
    delay: Option<Duration>,
}

enum Outcome {
    Items(Vec<RawNewsItem>),
    Fail(String),
}

impl FixtureAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        items: Vec<RawNewsItem>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            outcome: Outcome::Items(items),
            delay: None,
        }
    }

    /// A source whose every scrape fails with `reason`.
    pub fn failing(
        name: impl Into<String>,
        base_url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            outcome: Outcome::Fail(reason.into()),
            delay: None,
        }
    }

    /// Sleep before answering, to model a slow source.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NewsAdapter for FixtureAdapter {
    async fn scrape(&self) -> Result<Vec<RawNewsItem>> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        match &self.outcome {
            Outcome::Items(items) => Ok(items
                .iter()
                .cloned()
                .map(|mut it| {
                    if it.source.is_empty() {
                        it.source = self.name.clone();
                    }
                    it
                })
                .collect()),
            Outcome::Fail(reason) => Err(anyhow!("{}: {}", self.name, reason)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
