// tests/adapters_html.rs
use film_news_aggregator::ingest::adapters::{HtmlListingAdapter, HtmlSelectors};
use film_news_aggregator::NewsAdapter;
use std::fs;

fn selectors() -> HtmlSelectors {
    HtmlSelectors {
        item: "article.story".into(),
        title: "h2.headline".into(),
        link: "h2.headline a".into(),
        image: Some("img".into()),
        date: Some("time".into()),
        description: Some("p.summary".into()),
    }
}

#[tokio::test]
async fn listing_fixture_yields_linked_stories() {
    let html = fs::read_to_string("tests/fixtures/film_listing.html")
        .expect("missing tests/fixtures/film_listing.html");
    let adapter =
        HtmlListingAdapter::from_fixture("CineSite", "https://cinesite.test/news/", &selectors(), &html)
            .expect("valid selectors");

    assert_eq!(adapter.name(), "CineSite");
    let items = adapter.scrape().await.expect("listing parse ok");

    // The sponsored card has no link and is skipped.
    assert_eq!(items.len(), 2);

    let first = &items[0];
    assert_eq!(first.title.trim(), "Devara Release Date Out");
    assert_eq!(first.url, "https://cinesite.test/news/devara-release-date");
    assert_eq!(
        first.image_url.as_deref(),
        Some("https://cinesite.test/media/devara.jpg")
    );
    assert_eq!(first.published_at, "2024-09-01T10:00:00+05:30");
    assert!(first
        .description
        .as_deref()
        .is_some_and(|d| d.contains("confirmed")));

    let second = &items[1];
    assert_eq!(second.url, "https://cinesite.test/news/og-first-look");
    assert_eq!(second.published_at, "2 hours ago");
    assert_eq!(second.image_url, None);
    assert_eq!(second.description, None);
}
