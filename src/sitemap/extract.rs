//! Tolerant `<loc>` extraction from sitemap documents
//!
//! Sitemaps in the wild are frequently invalid XML (unescaped ampersands,
//! truncated bodies, stray markup). Extraction therefore scans the raw text
//! with regular expressions rather than parsing it as XML.

use quick_xml::escape::unescape;
use regex::Regex;
use std::sync::OnceLock;

static SITEMAP_BLOCK: OnceLock<Regex> = OnceLock::new();
static LOC: OnceLock<Regex> = OnceLock::new();

fn sitemap_block_regex() -> &'static Regex {
    SITEMAP_BLOCK.get_or_init(|| {
        Regex::new(r"(?i)<sitemap>[\s\S]*?<loc>(.*?)</loc>[\s\S]*?</sitemap>")
            .expect("static sitemap block pattern is valid")
    })
}

fn loc_regex() -> &'static Regex {
    LOC.get_or_init(|| Regex::new(r"(?i)<loc>(.*?)</loc>").expect("static loc pattern is valid"))
}

/// Shape of a fetched sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// A `<sitemapindex>`: locations of nested sitemaps, in document order
    Index(Vec<String>),

    /// A `<urlset>` (or anything else): page locations, in document order
    UrlSet(Vec<String>),
}

/// Classifies a sitemap body and extracts its locations
///
/// A body containing at least one `<sitemap>…<loc>…</loc>…</sitemap>` block is
/// an index; only the locs inside those blocks are returned. Otherwise every
/// `<loc>` in the body is returned. Locations are trimmed and entity-decoded;
/// empty ones are dropped. Relative locations are returned as-is.
pub fn parse_sitemap(body: &str) -> SitemapDocument {
    let nested: Vec<String> = sitemap_block_regex()
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| clean_loc(m.as_str()))
        .collect();

    if !nested.is_empty() {
        return SitemapDocument::Index(nested);
    }

    SitemapDocument::UrlSet(
        loc_regex()
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| clean_loc(m.as_str()))
            .collect(),
    )
}

/// Trims a raw loc value, unwraps CDATA and decodes XML entities
fn clean_loc(raw: &str) -> Option<String> {
    let mut value = raw.trim();

    if let Some(inner) = value
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        value = inner.trim();
    }

    if value.is_empty() {
        return None;
    }

    // Bare ampersands are common in hand-written sitemaps; keep such text raw
    let decoded = match unescape(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    };
    Some(decoded)
}
