//! URL handling module for Sitemap-Harvester
//!
//! This module provides URL normalization for frontier deduplication and
//! scope-host extraction for the follow-internal-only restriction.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{scope_host, scope_host_of};
pub use normalize::normalize_url;

/// Checks whether a candidate URL falls inside the scope of `start_host`
///
/// Scope is literal host equality (including a non-default port). Apex and
/// `www.` variants, or sibling subdomains, are different scopes.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitemap_harvester::url::in_scope;
///
/// let url = Url::parse("https://example.com/about").unwrap();
/// assert!(in_scope(&url, "example.com"));
/// assert!(!in_scope(&url, "www.example.com"));
/// ```
pub fn in_scope(url: &::url::Url, start_host: &str) -> bool {
    scope_host(url).map_or(false, |host| host == start_host)
}
