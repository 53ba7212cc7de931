//! Sitemap-Harvester main entry point
//!
//! This is the command-line interface for the Sitemap-Harvester crawler.

use clap::Parser;
use sitemap_harvester::config::{load_config_with_hash, validate, Config};
use sitemap_harvester::crawler::{resolve_seeds, run_crawl};
use sitemap_harvester::output::{generate_markdown_summary, load_statistics, print_statistics};
use sitemap_harvester::storage::open_storage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Sitemap-Harvester: a sitemap-driven page metadata crawler
///
/// Sitemap-Harvester expands sitemaps and sitemap indexes into seed URLs,
/// crawls them (and the links they contain) with a bounded worker pool, and
/// stores a compact record plus a full JSON document for every page.
#[derive(Parser, Debug)]
#[command(name = "sitemap-harvester")]
#[command(version)]
#[command(about = "A sitemap-driven page metadata crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and resolve sitemaps without crawling any page
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,

    /// Sitemap URL to crawl instead of the configured ones (repeatable)
    #[arg(long = "sitemap", value_name = "URL")]
    sitemaps: Vec<String>,

    /// Override the maximum number of pages admitted in this run
    #[arg(long, value_name = "N")]
    max_requests: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if apply_overrides(&mut config, &cli) {
        validate(&config)?;
    }

    if cli.dry_run {
        handle_dry_run(&config).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemap_harvester=info,warn"),
            1 => EnvFilter::new("sitemap_harvester=debug,info"),
            2 => EnvFilter::new("sitemap_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides; returns true when anything changed
fn apply_overrides(config: &mut Config, cli: &Cli) -> bool {
    let mut changed = false;

    if !cli.sitemaps.is_empty() {
        tracing::info!("Using {} sitemap(s) from the command line", cli.sitemaps.len());
        config.crawler.sitemaps = cli.sitemaps.clone();
        changed = true;
    }

    if let Some(max_requests) = cli.max_requests {
        config.crawler.max_requests_per_crawl = max_requests;
        changed = true;
    }

    changed
}

/// Handles the --dry-run mode: validates config and resolves the sitemaps
async fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sitemap-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max requests per crawl: {}", config.crawler.max_requests_per_crawl);
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Follow internal links only: {}", config.crawler.follow_internal_only);
    println!("  Extract main text: {}", config.crawler.extract_main_text);
    println!("  Max sitemap documents: {}", config.crawler.max_sitemaps);

    println!("\nTransport:");
    println!("  Request timeout: {}s", config.transport.request_timeout_secs);
    println!("  Max redirects: {}", config.transport.max_redirects);
    if let Some(proxy) = &config.transport.proxy_url {
        println!("  Proxy: {}", proxy);
    }
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Blob directory: {}", config.output.blob_dir);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSitemaps ({}):", config.crawler.sitemaps.len());
    for sitemap in &config.crawler.sitemaps {
        println!("  - {}", sitemap);
    }

    let seeds = resolve_seeds(config).await?;

    let mut per_sitemap: BTreeMap<&str, usize> = BTreeMap::new();
    for seed in &seeds {
        *per_sitemap.entry(seed.source_sitemap.as_str()).or_default() += 1;
    }

    println!("\nResolved URLs by Sitemap ({}):", per_sitemap.len());
    for (sitemap, count) in &per_sitemap {
        println!("  - {}: {}", sitemap, count);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs (at most {} pages)",
        seeds.len(),
        config.crawler.max_requests_per_crawl
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store, None)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    write_summary(config)?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

fn write_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_storage(Path::new(&config.output.database_path))?;

    tracing::info!("Loading crawl data from database...");
    let stats = load_statistics(&store, None)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&stats, Path::new(&config.output.summary_path))?;

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Sitemaps: {}, budget: {}, workers: {}",
        config.crawler.sitemaps.len(),
        config.crawler.max_requests_per_crawl,
        config.crawler.max_concurrency
    );

    let outcome = match run_crawl(config, config_hash).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let report = &outcome.report;
    tracing::info!(
        "Run {}: {} sitemap URLs, {} admitted, {} processed, {} fetch failures, {} non-HTML",
        outcome.run_id,
        outcome.sitemap_entries,
        report.admitted,
        report.processed,
        report.fetch_failures,
        report.content_mismatches
    );
    if report.record_failures > 0 || report.blob_failures > 0 {
        tracing::warn!(
            "{} record writes and {} document writes failed",
            report.record_failures,
            report.blob_failures
        );
    }

    if let Err(e) = write_summary(config) {
        tracing::warn!("Failed to write summary: {}", e);
    } else {
        tracing::info!("Summary written to {}", config.output.summary_path);
    }

    Ok(())
}
