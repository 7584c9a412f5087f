// src/ingest/adapters/mod.rs
pub mod fixture;
pub mod html;
pub mod rss;

use std::time::Duration;

pub use fixture::FixtureAdapter;
pub use html::{HtmlListingAdapter, HtmlSelectors};
pub use rss::RssAdapter;

/// Per-request timeout for HTTP-mode adapters.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "http client builder failed, using defaults");
            reqwest::Client::new()
        })
}

/// GET `url` and return the body; non-2xx is an error.
pub(crate) async fn fetch_body(
    client: &reqwest::Client,
    adapter: &str,
    url: &str,
) -> anyhow::Result<String> {
    use anyhow::Context as _;
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("{adapter} http get {url}"))?
        .error_for_status()
        .with_context(|| format!("{adapter} non-2xx from {url}"))?;
    resp.text()
        .await
        .with_context(|| format!("{adapter} http .text()"))
}
