//! Crawler module for sitemap-seeded page crawling
//!
//! This module contains the core crawling logic, including:
//! - HTTP transport and response classification
//! - HTML metadata extraction and link discovery
//! - Frontier admission (dedup, scope, budget)
//! - The bounded worker pool that drives a run

mod dispatcher;
mod fetcher;
mod frontier;
mod parser;
mod queue;

pub use dispatcher::{CrawlReport, DispatchSettings, Dispatcher, ShutdownHandle};
pub use fetcher::{
    build_http_client, fetch_url, is_html_content_type, FetchResult, HttpTransport, Transport,
};
pub use frontier::{Admission, CrawlTask, Frontier};
pub use parser::{HtmlPageProcessor, PageMetadata, PageProcessor, ProcessedPage, SNIPPET_MAX_CHARS};
pub use queue::TaskQueue;

use crate::config::Config;
use crate::sitemap::{SitemapEntry, SitemapResolver};
use crate::storage::{open_storage, FsBlobStore, RunStatus};
use std::path::Path;
use std::sync::Arc;

/// Result of a complete crawl run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Row-store ID of the run
    pub run_id: i64,

    /// Number of seed entries the sitemaps resolved to
    pub sitemap_entries: usize,

    pub report: CrawlReport,
}

/// Builds the transport described by the configuration
pub fn build_transport(config: &Config) -> crate::Result<Arc<HttpTransport>> {
    Ok(Arc::new(HttpTransport::from_config(
        &config.user_agent,
        &config.transport,
    )?))
}

/// Resolves every configured sitemap into seed entries
///
/// Never fails because of unreachable or malformed sitemaps; only building
/// the HTTP client can fail.
pub async fn resolve_seeds(config: &Config) -> crate::Result<Vec<SitemapEntry>> {
    let transport = build_transport(config)?;
    let resolver = SitemapResolver::new(transport).with_max_sitemaps(config.crawler.max_sitemaps);
    Ok(resolver.resolve_all(&config.crawler.sitemaps).await)
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the row store and blob store
/// 2. Record a new run
/// 3. Resolve the configured sitemaps into seeds
/// 4. Dispatch the crawl over the seeds
/// 5. Mark the run completed, or interrupted if Ctrl-C stopped it
///
/// Everything that can abort the run happens before the first page fetch.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
///
/// # Example
///
/// ```no_run
/// use sitemap_harvester::config::load_config_with_hash;
/// use sitemap_harvester::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let outcome = run_crawl(&config, &hash).await?;
/// println!("{} pages", outcome.report.processed);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, config_hash: &str) -> crate::Result<CrawlOutcome> {
    let shutdown = ShutdownHandle::new();

    let handle = shutdown.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl-C, stopping crawl");
            handle.shutdown();
        }
    });

    let outcome = run_crawl_until(config, config_hash, shutdown).await;
    ctrl_c.abort();
    outcome
}

/// Runs a complete crawl that stops early once `shutdown` is triggered
///
/// Shutdown is honored during sitemap resolution as well as during the
/// crawl itself; either way the run is recorded as interrupted.
pub async fn run_crawl_until(
    config: &Config,
    config_hash: &str,
    shutdown: ShutdownHandle,
) -> crate::Result<CrawlOutcome> {
    let store = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let blobs = Arc::new(FsBlobStore::open(Path::new(&config.output.blob_dir))?);
    let transport = build_transport(config)?;

    let run_id = store.create_run(config_hash)?;
    tracing::info!("Starting crawl run {}", run_id);

    let dispatcher = match Dispatcher::new(
        DispatchSettings::from_config(config),
        transport.clone(),
        Arc::new(HtmlPageProcessor::new(config.crawler.extract_main_text)),
        Arc::new(store.sink_for_run(run_id)),
        blobs,
    ) {
        Ok(dispatcher) => dispatcher.with_shutdown_handle(shutdown.clone()),
        Err(e) => {
            store.update_run_status(run_id, RunStatus::Failed)?;
            return Err(e);
        }
    };

    let resolver =
        SitemapResolver::new(transport).with_max_sitemaps(config.crawler.max_sitemaps);
    let resolved = tokio::select! {
        seeds = resolver.resolve_all(&config.crawler.sitemaps) => Some(seeds),
        _ = shutdown.wait() => None,
    };

    let Some(seeds) = resolved else {
        store.update_run_status(run_id, RunStatus::Interrupted)?;
        tracing::warn!("Crawl run {} interrupted during sitemap resolution", run_id);
        return Ok(CrawlOutcome {
            run_id,
            sitemap_entries: 0,
            report: CrawlReport {
                interrupted: true,
                ..CrawlReport::default()
            },
        });
    };

    if seeds.is_empty() {
        tracing::warn!("No URLs found in the configured sitemaps");
    }

    let report = dispatcher.run(&seeds).await;

    if report.interrupted {
        store.update_run_status(run_id, RunStatus::Interrupted)?;
        tracing::warn!("Crawl run {} interrupted", run_id);
    } else {
        store.complete_run(run_id)?;
        tracing::info!("Crawl run {} completed", run_id);
    }

    Ok(CrawlOutcome {
        run_id,
        sitemap_entries: seeds.len(),
        report,
    })
}
