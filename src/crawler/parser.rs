//! HTML page processing: metadata extraction and link discovery
//!
//! This module turns a fetched HTML document into:
//! - The page metadata persisted per URL (title, meta description, snippet)
//! - The list of outbound links offered to the frontier

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Maximum length of the main-text snippet, in characters
pub const SNIPPET_MAX_CHARS: usize = 800;

/// Minimum trimmed length of a paragraph used as the fallback snippet
const MIN_PARAGRAPH_CHARS: usize = 40;

/// Metadata extracted from one page
///
/// Every field is an empty string when the page has no matching content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub meta_description: String,
    pub snippet: String,
}

/// Result of processing one HTML document
#[derive(Debug, Clone, Default)]
pub struct ProcessedPage {
    /// Extracted metadata
    pub metadata: PageMetadata,

    /// All crawlable links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Turns a fetched HTML body into metadata and candidate links
///
/// Implementations are pure and never fail.
pub trait PageProcessor: Send + Sync {
    /// Processes `html`, resolving relative links against `base_url`
    fn process(&self, html: &str, base_url: &Url) -> ProcessedPage;
}

/// scraper-backed [`PageProcessor`]
#[derive(Debug, Clone)]
pub struct HtmlPageProcessor {
    extract_main_text: bool,
}

impl HtmlPageProcessor {
    /// Creates a processor; `extract_main_text` enables snippet extraction
    pub fn new(extract_main_text: bool) -> Self {
        Self { extract_main_text }
    }
}

impl PageProcessor for HtmlPageProcessor {
    fn process(&self, html: &str, base_url: &Url) -> ProcessedPage {
        let document = Html::parse_document(html);

        let metadata = PageMetadata {
            title: extract_title(&document),
            meta_description: extract_meta_description(&document),
            snippet: if self.extract_main_text {
                extract_snippet(&document)
            } else {
                String::new()
            },
        };

        ProcessedPage {
            metadata,
            links: extract_links(&document, base_url),
        }
    }
}

/// Extracts the page title
///
/// Preference order: `og:title`, `twitter:title`, then the first `<title>`.
fn extract_title(document: &Html) -> String {
    meta_content(document, r#"meta[property="og:title"]"#)
        .or_else(|| meta_content(document, r#"meta[name="twitter:title"]"#))
        .or_else(|| {
            first_match(document, "title")
                .map(|element| element.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
}

/// Extracts the meta description
///
/// Preference order: `<meta name="description">`, then `og:description`.
fn extract_meta_description(document: &Html) -> String {
    meta_content(document, r#"meta[name="description"]"#)
        .or_else(|| meta_content(document, r#"meta[property="og:description"]"#))
        .unwrap_or_default()
}

/// Extracts the main-text snippet
///
/// Uses the first `article`, `main` or `[role="main"]` element; falls back to
/// the first paragraph with more than 40 characters of text.
fn extract_snippet(document: &Html) -> String {
    if let Some(main) = first_match(document, r#"article, main, [role="main"]"#) {
        return collapse_and_truncate(&main.text().collect::<String>());
    }

    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|p| p.text().collect::<String>())
        .find(|text| text.trim().chars().count() > MIN_PARAGRAPH_CHARS)
        .map(|text| collapse_and_truncate(&text))
        .unwrap_or_default()
}

/// Collapses whitespace runs to single spaces, trims, and truncates
fn collapse_and_truncate(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_MAX_CHARS)
        .collect()
}

/// Returns the non-empty `content` attribute of the first element matching `selector`
///
/// Empty attributes fall through to the next candidate, as an empty title is
/// never preferable to a present one.
fn meta_content(document: &Html, selector: &str) -> Option<String> {
    first_match(document, selector)
        .and_then(|element| element.value().attr("content"))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Extracts all crawlable links from the HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
