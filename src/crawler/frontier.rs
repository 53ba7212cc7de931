//! Crawl frontier: URL admission and deduplication
//!
//! The frontier is the single place that decides whether a URL gets crawled.
//! Normalization, the scope check, the duplicate check and the budget check
//! all run under one lock together with the state update, so two workers
//! discovering the same link at the same time can never both admit it, and
//! the admitted count can never pass the budget.

use crate::sitemap::SitemapEntry;
use crate::url::{in_scope, normalize_url, scope_host_of};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// A URL admitted for crawling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL to fetch
    pub url: String,

    /// Scope host inherited from the seed this task descends from
    pub start_host: String,

    /// Sitemap the seed of this task came from
    pub sitemap: String,

    /// Link distance from the seed (seeds are 0)
    pub depth: u32,
}

/// Outcome of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Malformed,
    OutOfScope,
    Duplicate,
    BudgetExhausted,
}

#[derive(Debug, Default)]
struct FrontierState {
    seen: HashSet<String>,
    admitted: usize,
}

/// Shared admission state for one crawl run
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    budget: usize,
    follow_internal_only: bool,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `budget` - Maximum number of URLs ever admitted
    /// * `follow_internal_only` - Whether admitted URLs must match their task's start host
    pub fn new(budget: usize, follow_internal_only: bool) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            budget,
            follow_internal_only,
        }
    }

    /// Attempts to admit a URL
    ///
    /// Returns the task to crawl, or `None` if the URL is malformed, out of
    /// scope, already admitted, or the budget is spent. A rejection leaves the
    /// frontier unchanged.
    pub fn try_admit(
        &self,
        url: &str,
        start_host: &str,
        sitemap: &str,
        depth: u32,
    ) -> Option<CrawlTask> {
        let (admission, task) = self.admit(url, start_host, sitemap, depth);
        if admission != Admission::Admitted {
            tracing::trace!("Rejected {} ({:?})", url, admission);
        }
        task
    }

    /// Admits a sitemap entry as a seed task
    ///
    /// The start host comes from the entry's own URL, so seeds from sitemaps
    /// on different hosts each get their own scope.
    pub fn admit_seed(&self, entry: &SitemapEntry) -> Option<CrawlTask> {
        let Some(start_host) = scope_host_of(entry.url.trim()) else {
            tracing::debug!("Rejected seed {} (Malformed)", entry.url);
            return None;
        };
        self.try_admit(&entry.url, &start_host, &entry.source_sitemap, 0)
    }

    /// Admission check and state update under one lock
    fn admit(
        &self,
        url: &str,
        start_host: &str,
        sitemap: &str,
        depth: u32,
    ) -> (Admission, Option<CrawlTask>) {
        let normalized = match normalize_url(url) {
            Ok(normalized) => normalized,
            Err(_) => return (Admission::Malformed, None),
        };

        if self.follow_internal_only && !in_scope(&normalized, start_host) {
            return (Admission::OutOfScope, None);
        }

        let key = normalized.to_string();
        let mut state = self.lock();

        if state.seen.contains(&key) {
            return (Admission::Duplicate, None);
        }

        if state.admitted >= self.budget {
            return (Admission::BudgetExhausted, None);
        }

        state.seen.insert(key.clone());
        state.admitted += 1;

        (
            Admission::Admitted,
            Some(CrawlTask {
                url: key,
                start_host: start_host.to_string(),
                sitemap: sitemap.to_string(),
                depth,
            }),
        )
    }

    /// Number of URLs admitted so far
    pub fn admitted_count(&self) -> usize {
        self.lock().admitted
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Whether no further URL can be admitted
    pub fn is_exhausted(&self) -> bool {
        self.admitted_count() >= self.budget
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HOST: &str = "ex.com";
    const SITEMAP: &str = "https://ex.com/sitemap.xml";

    #[test]
    fn test_admit_returns_normalized_task() {
        let frontier = Frontier::new(10, true);
        let task = frontier
            .try_admit("https://EX.com/a#section", HOST, SITEMAP, 2)
            .unwrap();

        assert_eq!(task.url, "https://ex.com/a");
        assert_eq!(task.start_host, HOST);
        assert_eq!(task.sitemap, SITEMAP);
        assert_eq!(task.depth, 2);
        assert_eq!(frontier.admitted_count(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let frontier = Frontier::new(10, true);
        assert!(frontier.try_admit("https://ex.com/a", HOST, SITEMAP, 0).is_some());
        assert!(frontier.try_admit("https://ex.com/a", HOST, SITEMAP, 1).is_none());
        assert!(frontier.try_admit("https://ex.com/a#top", HOST, SITEMAP, 1).is_none());
        assert_eq!(frontier.admitted_count(), 1);
    }

    #[test]
    fn test_dedup_is_literal_after_normalization() {
        let frontier = Frontier::new(10, true);
        assert!(frontier.try_admit("https://ex.com/a", HOST, SITEMAP, 0).is_some());
        assert!(frontier.try_admit("https://ex.com/a/", HOST, SITEMAP, 0).is_some());
        assert!(frontier.try_admit("https://ex.com/A", HOST, SITEMAP, 0).is_some());
        assert!(frontier.try_admit("https://ex.com/a?x=1", HOST, SITEMAP, 0).is_some());
        assert_eq!(frontier.admitted_count(), 4);
    }

    #[test]
    fn test_malformed_rejected_without_mutation() {
        let frontier = Frontier::new(10, false);
        assert!(frontier.try_admit("not a url", HOST, SITEMAP, 0).is_none());
        assert!(frontier.try_admit("mailto:a@ex.com", HOST, SITEMAP, 0).is_none());
        assert_eq!(frontier.admitted_count(), 0);
    }

    #[test]
    fn test_budget_enforced() {
        let frontier = Frontier::new(2, true);
        assert!(frontier.try_admit("https://ex.com/1", HOST, SITEMAP, 0).is_some());
        assert!(frontier.try_admit("https://ex.com/2", HOST, SITEMAP, 0).is_some());
        assert!(frontier.is_exhausted());
        assert!(frontier.try_admit("https://ex.com/3", HOST, SITEMAP, 0).is_none());
        assert_eq!(frontier.admitted_count(), 2);
        assert_eq!(frontier.budget(), 2);
    }

    #[test]
    fn test_scope_enforced_when_internal_only() {
        let frontier = Frontier::new(10, true);
        assert!(frontier.try_admit("https://other.com/a", HOST, SITEMAP, 1).is_none());
        assert!(frontier.try_admit("https://www.ex.com/a", HOST, SITEMAP, 1).is_none());
        assert!(frontier.try_admit("https://ex.com:8443/a", HOST, SITEMAP, 1).is_none());
        assert_eq!(frontier.admitted_count(), 0);
    }

    #[test]
    fn test_scope_ignored_when_disabled() {
        let frontier = Frontier::new(10, false);
        let task = frontier.try_admit("https://other.com/a", HOST, SITEMAP, 1).unwrap();
        assert_eq!(task.start_host, HOST);
    }

    #[test]
    fn test_out_of_scope_does_not_consume_budget() {
        let frontier = Frontier::new(1, true);
        assert!(frontier.try_admit("https://other.com/a", HOST, SITEMAP, 1).is_none());
        assert!(frontier.try_admit("https://ex.com/a", HOST, SITEMAP, 1).is_some());
    }

    #[test]
    fn test_admit_seed_uses_own_host() {
        let frontier = Frontier::new(10, true);
        let a = frontier
            .admit_seed(&SitemapEntry {
                url: "https://ex.com/a".to_string(),
                source_sitemap: SITEMAP.to_string(),
            })
            .unwrap();
        let b = frontier
            .admit_seed(&SitemapEntry {
                url: "http://docs.other.com:8080/b".to_string(),
                source_sitemap: "https://other.com/sitemap.xml".to_string(),
            })
            .unwrap();

        assert_eq!(a.start_host, "ex.com");
        assert_eq!(a.depth, 0);
        assert_eq!(b.start_host, "docs.other.com:8080");
        assert_eq!(b.sitemap, "https://other.com/sitemap.xml");
    }

    #[test]
    fn test_admit_seed_malformed() {
        let frontier = Frontier::new(10, true);
        assert!(frontier
            .admit_seed(&SitemapEntry {
                url: "/relative".to_string(),
                source_sitemap: SITEMAP.to_string(),
            })
            .is_none());
    }

    #[test]
    fn test_concurrent_admission_is_exclusive() {
        let frontier = Arc::new(Frontier::new(50, true));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let frontier = frontier.clone();
            handles.push(std::thread::spawn(move || {
                let mut admitted = Vec::new();
                for i in 0..100 {
                    let url = format!("https://ex.com/page/{}", i);
                    if let Some(task) = frontier.try_admit(&url, HOST, SITEMAP, 0) {
                        admitted.push(task.url);
                    }
                }
                admitted
            }));
        }

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();

        assert_eq!(total, 50);
        assert_eq!(all.len(), 50);
        assert_eq!(frontier.admitted_count(), 50);
    }
}
