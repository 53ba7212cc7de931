//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings and proxying
//! - GET requests for sitemap documents and pages
//! - Redirect following
//! - Error classification
//!
//! Failures are returned as [`FetchResult`] variants rather than errors so the
//! resolver and the dispatcher handle every outcome in one `match`.

use crate::config::{TransportConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Proxy};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// Received a 2xx response
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value (empty when absent)
        content_type: String,
        /// Response body
        body: String,
    },

    /// Received a non-2xx response
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, redirect loop, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// Whether the request ran out of time
        timed_out: bool,
    },
}

impl FetchResult {
    /// Returns true for a 2xx response
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short description of a failed fetch, for logging
    pub fn describe_failure(&self) -> String {
        match self {
            Self::Success { status_code, .. } => format!("HTTP {}", status_code),
            Self::HttpError { status_code } => format!("HTTP {}", status_code),
            Self::NetworkError { error, timed_out } => {
                if *timed_out {
                    format!("timeout: {}", error)
                } else {
                    error.clone()
                }
            }
        }
    }
}

/// Outbound HTTP transport used by the sitemap resolver and the dispatcher
///
/// Implementations follow redirects, enforce their own request timeout and
/// never panic; every failure is reported through [`FetchResult`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a GET request for `url`
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `transport` - Timeouts, redirect limit and optional proxy
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. bad proxy URL)
///
/// # Example
///
/// ```no_run
/// use sitemap_harvester::config::{TransportConfig, UserAgentConfig};
/// use sitemap_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &TransportConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    transport: &TransportConfig,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(transport.request_timeout_secs))
        .connect_timeout(Duration::from_secs(transport.connect_timeout_secs))
        .redirect(Policy::limited(transport.max_redirects))
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = &transport.proxy_url {
        builder = builder.proxy(Proxy::all(proxy_url.as_str())?);
    }

    builder.build()
}

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Wraps an already configured client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        transport: &TransportConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, transport)?))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> FetchResult {
        fetch_url(&self.client, url).await
    }
}

/// Fetches a URL and classifies the outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 2xx | `Success` |
/// | Any other status | `HttpError` |
/// | Timeout | `NetworkError { timed_out: true }` |
/// | Connection refused | `NetworkError` |
/// | Redirect loop / too many hops | `NetworkError` |
/// | Body read failure | `NetworkError` |
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            let final_url = response.url().to_string();

            if !status.is_success() {
                return FetchResult::HttpError {
                    status_code: status.as_u16(),
                };
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            match response.text().await {
                Ok(body) => FetchResult::Success {
                    final_url,
                    status_code: status.as_u16(),
                    content_type,
                    body,
                },
                Err(e) => FetchResult::NetworkError {
                    error: e.to_string(),
                    timed_out: e.is_timeout(),
                },
            }
        }
        Err(e) => {
            if e.is_timeout() {
                FetchResult::NetworkError {
                    error: "Request timeout".to_string(),
                    timed_out: true,
                }
            } else if e.is_connect() {
                FetchResult::NetworkError {
                    error: "Connection refused".to_string(),
                    timed_out: false,
                }
            } else if e.is_redirect() {
                FetchResult::NetworkError {
                    error: format!("Redirect error: {}", e),
                    timed_out: false,
                }
            } else {
                FetchResult::NetworkError {
                    error: e.to_string(),
                    timed_out: false,
                }
            }
        }
    }
}

/// Returns true when a Content-Type header denotes an HTML document
///
/// A missing header is accepted; servers frequently omit it for HTML.
pub fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    content_type.is_empty()
        || content_type.starts_with("text/html")
        || content_type.starts_with("application/xhtml+xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&UserAgentConfig::default(), &TransportConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport = TransportConfig {
            proxy_url: Some("http://127.0.0.1:3128".to_string()),
            ..TransportConfig::default()
        };
        let client = build_http_client(&UserAgentConfig::default(), &transport);
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        let config = UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        };
        assert_eq!(
            config.header_value(),
            "TestCrawler/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_html_content_types() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("Text/HTML"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(is_html_content_type(""));

        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("image/png"));
        assert!(!is_html_content_type("application/xml"));
    }

    #[test]
    fn test_describe_failure() {
        let http = FetchResult::HttpError { status_code: 503 };
        assert_eq!(http.describe_failure(), "HTTP 503");

        let timeout = FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            timed_out: true,
        };
        assert!(timeout.describe_failure().starts_with("timeout"));
        assert!(!timeout.is_success());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let transport = TransportConfig {
            request_timeout_secs: 2,
            connect_timeout_secs: 1,
            ..TransportConfig::default()
        };
        let client = build_http_client(&UserAgentConfig::default(), &transport).unwrap();

        // Port 9 (discard) is closed on loopback in any sane test environment
        let result = fetch_url(&client, "http://127.0.0.1:9/").await;
        assert!(matches!(result, FetchResult::NetworkError { .. }));
    }
}
