// tests/ingest_normalize.rs
use film_news_aggregator::ingest::normalize::{normalize, Normalizer};
use film_news_aggregator::{NormalizationError, RawNewsItem};

fn raw(title: &str) -> RawNewsItem {
    RawNewsItem::new(title, "https://gulte.test/a", "Gulte")
        .with_published_at("2024-09-27T03:30:00Z")
        .with_image_url("https://gulte.test/a.jpg")
}

#[test]
fn boilerplate_prefix_is_removed() {
    let n = normalize(raw("Review: Movie X Gets Great Response")).unwrap();
    assert_eq!(n.title(), "Movie X Gets Great Response");
}

#[test]
fn missing_description_is_synthesized_exactly() {
    let n = normalize(raw("Movie X Gets Great Response")).unwrap();
    assert_eq!(
        n.description(),
        "Read the latest update about Movie X Gets Great Response on Gulte."
    );
}

#[test]
fn present_description_is_cleaned_not_replaced() {
    let n = normalize(raw("Movie X").with_description("<p>Fans&nbsp;line up\n early.</p>")).unwrap();
    assert_eq!(n.description(), "Fans line up early.");
}

#[test]
fn passthrough_fields_are_untouched() {
    let n = normalize(raw("  Live Updates:  Movie   X  ")).unwrap();
    assert_eq!(n.title(), "Movie X");
    assert_eq!(n.url(), "https://gulte.test/a");
    assert_eq!(n.image_url(), Some("https://gulte.test/a.jpg"));
    assert_eq!(n.published_at(), "2024-09-27T03:30:00Z");
    assert_eq!(n.source(), "Gulte");
}

#[test]
fn empty_title_is_a_validation_error() {
    let err = normalize(raw("   ")).unwrap_err();
    assert!(matches!(err, NormalizationError::EmptyTitle { .. }));
}

#[test]
fn missing_url_is_a_validation_error() {
    let err = normalize(RawNewsItem::new("Movie X", "", "Gulte")).unwrap_err();
    assert_eq!(
        err,
        NormalizationError::MissingUrl {
            title: "Movie X".into()
        }
    );
}

#[test]
fn configured_labels_extend_stripping() {
    let n = Normalizer::new(["Review:", "Live Updates:", "News:", "Exclusive:"]);
    let item = n.normalize(raw("EXCLUSIVE: News: Movie X")).unwrap();
    assert_eq!(item.title(), "Movie X");
}
