// src/ingest/adapters/html.rs
//! Listing-page source: one page, one CSS selector per field.
//!
//! Relative links and image sources are resolved against the page URL.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{fetch_body, http_client, DEFAULT_HTTP_TIMEOUT};
use crate::ingest::types::{NewsAdapter, RawNewsItem};

/// CSS selectors describing a listing page. `title` and `link` are required;
/// the link selector may match the same element as the title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HtmlSelectors {
    pub item: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

struct Compiled {
    item: Selector,
    title: Selector,
    link: Selector,
    image: Option<Selector>,
    date: Option<Selector>,
    description: Option<Selector>,
}

fn parse_selector(kind: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid {kind} selector `{css}`: {e}"))
}

impl Compiled {
    fn new(s: &HtmlSelectors) -> Result<Self> {
        Ok(Self {
            item: parse_selector("item", &s.item)?,
            title: parse_selector("title", &s.title)?,
            link: parse_selector("link", &s.link)?,
            image: s.image.as_deref().map(|c| parse_selector("image", c)).transpose()?,
            date: s.date.as_deref().map(|c| parse_selector("date", c)).transpose()?,
            description: s
                .description
                .as_deref()
                .map(|c| parse_selector("description", c))
                .transpose()?,
        })
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn first<'a>(scope: ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    scope.select(sel).next()
}

pub struct HtmlListingAdapter {
    name: String,
    base: Url,
    selectors: Compiled,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl HtmlListingAdapter {
    fn build(
        name: String,
        base_url: &str,
        selectors: &HtmlSelectors,
        mode: Mode,
    ) -> Result<Self> {
        let base =
            Url::parse(base_url).with_context(|| format!("invalid base url `{base_url}`"))?;
        let selectors = Compiled::new(selectors)?;
        Ok(Self {
            name,
            base,
            selectors,
            mode,
        })
    }

    /// Scrape an HTML document held in memory; links resolve against `base_url`.
    pub fn from_fixture(
        name: impl Into<String>,
        base_url: &str,
        selectors: &HtmlSelectors,
        html: &str,
    ) -> Result<Self> {
        Self::build(name.into(), base_url, selectors, Mode::Fixture(html.to_string()))
    }

    pub fn from_url(
        name: impl Into<String>,
        url: &str,
        selectors: &HtmlSelectors,
    ) -> Result<Self> {
        Self::from_url_with_timeout(name, url, selectors, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn from_url_with_timeout(
        name: impl Into<String>,
        url: &str,
        selectors: &HtmlSelectors,
        timeout: Duration,
    ) -> Result<Self> {
        let client = http_client(timeout);
        Self::build(name.into(), url, selectors, Mode::Http { client })
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base.join(href).ok().map(|u| u.to_string())
    }

    fn parse_listing(&self, html: &str) -> Vec<RawNewsItem> {
        let t0 = std::time::Instant::now();
        let document = Html::parse_document(html);
        let sel = &self.selectors;

        let mut out = Vec::new();
        for el in document.select(&sel.item) {
            let Some(title_el) = first(el, &sel.title) else {
                continue;
            };
            let Some(url) = first(el, &sel.link)
                .and_then(|a| a.value().attr("href"))
                .and_then(|h| self.resolve(h))
            else {
                tracing::debug!(adapter = %self.name, "listing entry without link skipped");
                continue;
            };

            let image_url = sel
                .image
                .as_ref()
                .and_then(|s| first(el, s))
                .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
                .and_then(|src| self.resolve(src));

            let published_at = sel
                .date
                .as_ref()
                .and_then(|s| first(el, s))
                .map(|d| {
                    d.value()
                        .attr("datetime")
                        .map(str::to_string)
                        .unwrap_or_else(|| text_of(d))
                })
                .map(|d| d.trim().to_string())
                .unwrap_or_default();

            let description = sel
                .description
                .as_ref()
                .and_then(|s| first(el, s))
                .map(text_of);

            out.push(RawNewsItem {
                title: text_of(title_el),
                url,
                image_url,
                published_at,
                source: self.name.clone(),
                description,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_ingest_parse_ms", "adapter" => self.name.clone()).record(ms);
        out
    }
}

#[async_trait]
impl NewsAdapter for HtmlListingAdapter {
    async fn scrape(&self) -> Result<Vec<RawNewsItem>> {
        match &self.mode {
            Mode::Fixture(html) => Ok(self.parse_listing(html)),
            Mode::Http { client } => {
                let body = match fetch_body(client, &self.name, self.base.as_str()).await {
                    Ok(b) => b,
                    Err(e) => {
                        counter!("news_ingest_http_errors_total", "adapter" => self.name.clone())
                            .increment(1);
                        return Err(e);
                    }
                };
                Ok(self.parse_listing(&body))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        self.base.as_str()
    }
}
