use serde::Deserialize;

/// Main configuration structure for Sitemap-Harvester
///
/// Every section is optional; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub transport: TransportConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Seed sitemap URLs (urlsets or sitemap indexes)
    pub sitemaps: Vec<String>,

    /// Maximum number of URLs admitted to the frontier in one run
    #[serde(rename = "max-requests-per-crawl")]
    pub max_requests_per_crawl: usize,

    /// Whether to extract a main-text snippet from each page
    #[serde(rename = "extract-main-text")]
    pub extract_main_text: bool,

    /// Whether discovered links must stay on the host of their seed URL
    #[serde(rename = "follow-internal-only")]
    pub follow_internal_only: bool,

    /// Number of concurrent fetch workers
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Maximum number of sitemap documents fetched while resolving seeds
    #[serde(rename = "max-sitemaps")]
    pub max_sitemaps: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            sitemaps: vec!["https://example.com/sitemap.xml".to_string()],
            max_requests_per_crawl: 500,
            extract_main_text: true,
            follow_internal_only: true,
            max_concurrency: 8,
            max_sitemaps: 1000,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Maximum redirect hops followed per request
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Optional proxy applied to every request
    #[serde(rename = "proxy-url")]
    pub proxy_url: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            max_redirects: 10,
            proxy_url: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SitemapHarvester".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database holding page records
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory of the JSON blob store holding full page documents
    #[serde(rename = "blob-dir")]
    pub blob_dir: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./harvest.db".to_string(),
            blob_dir: "./blobs".to_string(),
            summary_path: "./summary.md".to_string(),
        }
    }
}
