// src/ingest/normalize.rs
//! Raw → normalized item cleanup. Pure and deterministic, no I/O.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::NormalizationError;
use crate::ingest::types::{NormalizedNewsItem, RawNewsItem};

/// Labels sources prepend to headlines that carry no information.
pub const DEFAULT_TITLE_PREFIXES: &[&str] = &["Review:", "Live Updates:", "News:"];

/// Clean free text: decode entities, drop tags, fold curly quotes, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (NBSP included, \s is Unicode-aware)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Description used when a source ships none.
pub fn synthesized_description(title: &str, source: &str) -> String {
    format!("Read the latest update about {title} on {source}.")
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    prefixes: Vec<String>,
    prefix_re: Option<Regex>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_PREFIXES.iter().copied())
    }
}

impl Normalizer {
    /// Build a normalizer stripping the given labels (matched literally, case-insensitive).
    /// Blank labels are ignored; an empty list disables prefix stripping.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let prefix_re = if prefixes.is_empty() {
            None
        } else {
            let alternation = prefixes
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            // escaped literals only, cannot fail to compile
            Regex::new(&format!(r"(?i)^\s*(?:{alternation})\s*")).ok()
        };

        Self {
            prefixes,
            prefix_re,
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Clean a headline and strip leading labels until none is left.
    pub fn clean_title(&self, title: &str) -> String {
        let mut out = clean_text(title);
        if let Some(re) = &self.prefix_re {
            loop {
                let Some(m) = re.find(&out) else { break };
                if m.end() == 0 {
                    break;
                }
                out = out[m.end()..].trim().to_string();
            }
        }
        out
    }

    pub fn normalize(&self, item: RawNewsItem) -> Result<NormalizedNewsItem, NormalizationError> {
        let title = self.clean_title(&item.title);
        let url = item.url.trim().to_string();

        if url.is_empty() {
            return Err(NormalizationError::MissingUrl { title });
        }
        if title.is_empty() {
            return Err(NormalizationError::EmptyTitle { url });
        }

        let description = item
            .description
            .as_deref()
            .map(clean_text)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| synthesized_description(&title, &item.source));

        let image_url = item
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(NormalizedNewsItem::from_parts(
            title,
            url,
            image_url,
            item.published_at,
            item.source,
            description,
        ))
    }
}

/// Normalize with the default label list.
pub fn normalize(item: RawNewsItem) -> Result<NormalizedNewsItem, NormalizationError> {
    static DEFAULT: OnceCell<Normalizer> = OnceCell::new();
    DEFAULT.get_or_init(Normalizer::default).normalize(item)
}
