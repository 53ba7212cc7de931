use url::Url;

/// Extracts the host used for crawl-scope checks
///
/// The scope host is the hostname followed by `:port` when the URL carries a
/// port that is not the default for its scheme, so `https://example.com/` and
/// `https://example.com:8443/` belong to different scopes while
/// `https://example.com:443/` and `https://example.com/` share one.
///
/// # Arguments
///
/// * `url` - The URL to extract the scope host from
///
/// # Returns
///
/// * `Some(String)` - The lowercase host, with a non-default port appended
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitemap_harvester::url::scope_host;
///
/// let url = Url::parse("https://example.com/path").unwrap();
/// assert_eq!(scope_host(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:3000/").unwrap();
/// assert_eq!(scope_host(&url), Some("127.0.0.1:3000".to_string()));
/// ```
pub fn scope_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Parses a string and returns its scope host
///
/// Malformed URLs have no scope.
pub fn scope_host_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(scope_host)
}
