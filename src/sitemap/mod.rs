//! Sitemap resolution
//!
//! Expands seed sitemap URLs into the flat list of page URLs the crawl starts
//! from. Sitemap indexes are followed depth-first; every sitemap document is
//! fetched at most once per resolution, so indexes that reference themselves
//! or each other terminate.
//!
//! Resolution never fails as a whole. A sitemap that cannot be fetched or
//! contains nothing usable is logged and contributes no entries, while its
//! siblings are still resolved.

mod extract;

pub use extract::{parse_sitemap, SitemapDocument};

use crate::crawler::{FetchResult, Transport};
use crate::url::normalize_url;
use std::collections::HashSet;
use std::sync::Arc;

/// Default cap on sitemap documents fetched in one resolution
pub const DEFAULT_MAX_SITEMAPS: usize = 1000;

/// A page URL discovered in a sitemap
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SitemapEntry {
    /// The page URL as written in the sitemap
    pub url: String,

    /// URL of the urlset sitemap the entry was read from
    pub source_sitemap: String,
}

/// Resolves sitemap URLs (urlsets and nested indexes) into [`SitemapEntry`] values
pub struct SitemapResolver {
    transport: Arc<dyn Transport>,
    max_sitemaps: usize,
}

/// Bookkeeping shared by every branch of one resolution
#[derive(Default)]
struct ResolveState {
    visited: HashSet<String>,
    fetched: usize,
    limit_logged: bool,
}

impl SitemapResolver {
    /// Creates a resolver fetching through `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_sitemaps: DEFAULT_MAX_SITEMAPS,
        }
    }

    /// Sets the maximum number of sitemap documents fetched per resolution
    pub fn with_max_sitemaps(mut self, max_sitemaps: usize) -> Self {
        self.max_sitemaps = max_sitemaps;
        self
    }

    /// Resolves one sitemap URL
    ///
    /// Entries come back in document order, nested sitemaps expanded in place.
    pub async fn resolve(&self, url: &str) -> Vec<SitemapEntry> {
        let mut state = ResolveState::default();
        self.resolve_tree(url, &mut state).await
    }

    /// Resolves every seed sitemap and removes duplicate entries
    ///
    /// The visited set spans all seeds, so a sitemap shared by two seeds is
    /// fetched once. Duplicate `(url, source_sitemap)` pairs keep their first
    /// position.
    pub async fn resolve_all(&self, sitemaps: &[String]) -> Vec<SitemapEntry> {
        let mut state = ResolveState::default();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for sitemap in sitemaps {
            let resolved = self.resolve_tree(sitemap, &mut state).await;
            tracing::info!("Sitemap {} yielded {} URLs", sitemap, resolved.len());

            for entry in resolved {
                if seen.insert(entry.clone()) {
                    entries.push(entry);
                }
            }
        }

        tracing::info!(
            "Resolved {} unique sitemap entries from {} sitemap documents",
            entries.len(),
            state.fetched
        );

        entries
    }

    /// Depth-first walk of one sitemap tree using an explicit worklist
    ///
    /// Children are pushed in reverse so they pop in document order, which
    /// matches concatenating recursive results.
    async fn resolve_tree(&self, root: &str, state: &mut ResolveState) -> Vec<SitemapEntry> {
        let mut entries = Vec::new();
        let mut stack = vec![root.to_string()];

        while let Some(current) = stack.pop() {
            let sitemap_url = match normalize_url(&current) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping invalid sitemap URL {}: {}", current, e);
                    continue;
                }
            };
            let key = sitemap_url.to_string();

            if !state.visited.insert(key.clone()) {
                tracing::debug!("Sitemap {} already visited, skipping", key);
                continue;
            }

            if state.fetched >= self.max_sitemaps {
                if !state.limit_logged {
                    tracing::warn!(
                        "Sitemap limit of {} documents reached, ignoring the rest",
                        self.max_sitemaps
                    );
                    state.limit_logged = true;
                }
                continue;
            }
            state.fetched += 1;

            let body = match self.transport.fetch(&key).await {
                FetchResult::Success { body, .. } => body,
                failure => {
                    tracing::warn!(
                        "Failed to fetch sitemap {}: {}",
                        key,
                        failure.describe_failure()
                    );
                    continue;
                }
            };

            match parse_sitemap(&body) {
                SitemapDocument::Index(children) => {
                    tracing::debug!("Sitemap index {} lists {} sitemaps", key, children.len());
                    for child in children.iter().rev() {
                        match sitemap_url.join(child) {
                            Ok(child_url) => stack.push(child_url.to_string()),
                            Err(e) => {
                                tracing::warn!("Skipping nested sitemap {} in {}: {}", child, key, e)
                            }
                        }
                    }
                }
                SitemapDocument::UrlSet(locs) => {
                    if locs.is_empty() {
                        tracing::warn!("Sitemap {} contains no <loc> entries", key);
                    }
                    entries.extend(locs.into_iter().map(|url| SitemapEntry {
                        url,
                        source_sitemap: key.clone(),
                    }));
                }
            }
        }

        entries
    }
}
