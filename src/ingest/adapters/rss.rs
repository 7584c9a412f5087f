// src/ingest/adapters/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use super::{fetch_body, http_client, DEFAULT_HTTP_TIMEOUT};
use crate::ingest::types::{NewsAdapter, RawNewsItem};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    enclosure: Option<Enclosure>,
    // Prefix kept as written in the document; bare `content` for feeds that
    // declare the Media RSS namespace as default.
    #[serde(rename = "media:content", alias = "content", default)]
    media: Vec<MediaContent>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaContent {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(rename = "@medium")]
    medium: Option<String>,
}

impl MediaContent {
    fn is_image(&self) -> bool {
        let by_medium = self.medium.as_deref().map_or(true, |m| m == "image");
        let by_type = self.kind.as_deref().map_or(true, |k| k.starts_with("image/"));
        by_medium && by_type
    }
}

/// RFC 2822 `pubDate` → RFC 3339 UTC; anything unparseable passes through trimmed.
fn published_at(raw: &str) -> String {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc2822)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// RSS 2.0 feed source.
pub struct RssAdapter {
    name: String,
    base_url: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl RssAdapter {
    /// Parse a feed document held in memory instead of fetching it.
    pub fn from_fixture(name: impl Into<String>, base_url: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::from_url_with_timeout(name, url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn from_url_with_timeout(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: url.into(),
            mode: Mode::Http {
                client: http_client(timeout),
            },
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawNewsItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing {} rss xml", self.name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            // Without a link there is no identity; skip rather than invent one.
            let Some(url) = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
                continue;
            };
            let image_url = it
                .enclosure
                .filter(|e| e.kind.as_deref().map_or(true, |k| k.starts_with("image/")))
                .and_then(|e| e.url)
                .or_else(|| {
                    it.media
                        .into_iter()
                        .filter(MediaContent::is_image)
                        .find_map(|m| m.url)
                })
                .filter(|u| !u.trim().is_empty());

            out.push(RawNewsItem {
                title: it.title.unwrap_or_default(),
                url,
                image_url,
                published_at: it.pub_date.as_deref().map(published_at).unwrap_or_default(),
                source: self.name.clone(),
                description: it.description,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_ingest_parse_ms", "adapter" => self.name.clone()).record(ms);
        Ok(out)
    }
}

#[async_trait]
impl NewsAdapter for RssAdapter {
    async fn scrape(&self) -> Result<Vec<RawNewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { client } => {
                let body = match fetch_body(client, &self.name, &self.base_url).await {
                    Ok(b) => b,
                    Err(e) => {
                        counter!("news_ingest_http_errors_total", "adapter" => self.name.clone())
                            .increment(1);
                        return Err(e);
                    }
                };
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pub_date_is_rendered_as_rfc3339() {
        assert_eq!(
            published_at("Mon, 07 Oct 2024 10:30:00 +0530"),
            "2024-10-07T05:00:00Z"
        );
    }

    #[test]
    fn unparseable_pub_date_passes_through() {
        assert_eq!(published_at(" yesterday "), "yesterday");
    }

    #[tokio::test]
    async fn items_without_link_are_skipped() {
        let xml = r#"<rss><channel>
            <item><title>No link here</title></item>
            <item><title>Linked</title><link>https://feed.test/1</link></item>
        </channel></rss>"#;
        let a = RssAdapter::from_fixture("Feed", "https://feed.test", xml);
        let items = a.scrape().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Linked");
        assert_eq!(items[0].source, "Feed");
        assert_eq!(items[0].published_at, "");
    }

    #[tokio::test]
    async fn enclosure_wins_over_media_content() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <item>
              <title>Both</title><link>https://feed.test/1</link>
              <enclosure url="https://feed.test/enc.jpg" type="image/jpeg"/>
              <media:content url="https://feed.test/media.jpg" medium="image"/>
            </item>
            <item>
              <title>Video first</title><link>https://feed.test/2</link>
              <media:content url="https://feed.test/clip.mp4" medium="video"/>
              <media:content url="https://feed.test/still.jpg" type="image/jpeg"/>
            </item>
        </channel></rss>"#;
        let a = RssAdapter::from_fixture("Feed", "https://feed.test", xml);
        let items = a.scrape().await.unwrap();
        assert_eq!(items[0].image_url.as_deref(), Some("https://feed.test/enc.jpg"));
        assert_eq!(items[1].image_url.as_deref(), Some("https://feed.test/still.jpg"));
    }

    #[tokio::test]
    async fn empty_channel_yields_nothing() {
        let xml = "<rss><channel></channel></rss>";
        let a = RssAdapter::from_fixture("Feed", "https://feed.test", xml);
        assert!(a.scrape().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_xml_is_an_error() {
        let a = RssAdapter::from_fixture("Feed", "https://feed.test", "plain text, not a feed");
        assert!(a.scrape().await.is_err());
    }
}
