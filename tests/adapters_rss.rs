// tests/adapters_rss.rs
use film_news_aggregator::ingest::adapters::RssAdapter;
use film_news_aggregator::ingest::normalize::normalize;
use film_news_aggregator::NewsAdapter;
use std::fs;

fn fixture_adapter() -> RssAdapter {
    let xml = fs::read_to_string("tests/fixtures/film_rss.xml")
        .expect("missing tests/fixtures/film_rss.xml");
    RssAdapter::from_fixture("TeluguFilmFeed", "https://filmfeed.test/rss", &xml)
}

#[tokio::test]
async fn film_feed_fixture_parses_every_linked_item() {
    let items = fixture_adapter().scrape().await.expect("rss parse ok");
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|i| i.source == "TeluguFilmFeed"));

    let devara = &items[0];
    assert_eq!(devara.url, "https://filmfeed.test/2024/09/devara-review");
    assert_eq!(devara.published_at, "2024-09-27T03:30:00Z");
    assert_eq!(
        devara.image_url.as_deref(),
        Some("https://filmfeed.test/img/devara.jpg")
    );

    // No enclosure; the Media RSS image is used instead.
    assert_eq!(
        items[1].image_url.as_deref(),
        Some("https://filmfeed.test/img/pushpa-2.jpg")
    );
    assert_eq!(items[2].image_url, None);

    // Unparseable dates are kept as published.
    assert_eq!(items[3].published_at, "someday soon");
}

#[tokio::test]
async fn fixture_items_normalize_as_expected() {
    let items = fixture_adapter().scrape().await.unwrap();
    let normalized: Vec<_> = items.into_iter().map(normalize).collect();

    let first = normalized[0].as_ref().unwrap();
    assert_eq!(first.title(), "Devara Part 1 Gets Great Response");
    assert_eq!(first.description(), r#"Audiences cheer the "sea" sequences."#);

    let second = normalized[1].as_ref().unwrap();
    assert_eq!(second.title(), "Pushpa 2 pre-release event");
    assert_eq!(
        second.description(),
        "Read the latest update about Pushpa 2 pre-release event on TeluguFilmFeed."
    );

    // "News:" alone is not a headline.
    assert!(normalized[2].is_err());

    let fourth = normalized[3].as_ref().unwrap();
    assert_eq!(fourth.title(), "Game Changer trailer date locked");
}
