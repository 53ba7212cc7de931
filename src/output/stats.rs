//! Statistics generation from the row store
//!
//! This module provides functionality for extracting and displaying
//! per-run statistics from the page records database.

use crate::output::{OutputError, OutputResult};
use crate::storage::{RunRecord, SqliteRecordStore};
use chrono::{DateTime, Utc};

/// Statistics of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// The run the statistics describe
    pub run: RunRecord,

    /// Number of page records written
    pub total_records: u64,

    /// Records with a non-empty title
    pub with_title: u64,

    /// Records with a non-empty meta description
    pub with_description: u64,

    /// Records with a non-empty snippet
    pub with_snippet: u64,

    /// Records per source sitemap, largest first
    pub records_by_sitemap: Vec<(String, u64)>,
}

impl CrawlStatistics {
    /// Run duration in seconds, when the run has finished
    pub fn duration_seconds(&self) -> Option<u64> {
        let started = self.run.started_at.parse::<DateTime<Utc>>().ok()?;
        let finished = self.run.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
        Some((finished - started).num_seconds().max(0) as u64)
    }

    /// Share of records with `count` filled in, as a percentage
    pub fn coverage(&self, count: u64) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            (count as f64 / self.total_records as f64) * 100.0
        }
    }
}

/// Loads statistics for a run
///
/// # Arguments
///
/// * `store` - The row store to query
/// * `run_id` - The run to describe; the most recent run when `None`
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(OutputError::NoRuns)` - The database has no runs yet
pub fn load_statistics(
    store: &SqliteRecordStore,
    run_id: Option<i64>,
) -> OutputResult<CrawlStatistics> {
    let run = match run_id {
        Some(id) => store.get_run(id)?,
        None => store.get_latest_run()?.ok_or(OutputError::NoRuns)?,
    };

    Ok(CrawlStatistics {
        total_records: store.count_records(run.id)?,
        with_title: store.count_records_with_title(run.id)?,
        with_description: store.count_records_with_description(run.id)?,
        with_snippet: store.count_records_with_snippet(run.id)?,
        records_by_sitemap: store.count_records_by_sitemap(run.id)?,
        run,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run {}:", stats.run.id);
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(duration) = stats.duration_seconds() {
        println!("  Duration: {}s", duration);
    }
    println!();

    println!("Records:");
    println!("  Total pages recorded: {}", stats.total_records);
    println!(
        "  With title: {} ({:.1}%)",
        stats.with_title,
        stats.coverage(stats.with_title)
    );
    println!(
        "  With meta description: {} ({:.1}%)",
        stats.with_description,
        stats.coverage(stats.with_description)
    );
    println!(
        "  With snippet: {} ({:.1}%)",
        stats.with_snippet,
        stats.coverage(stats.with_snippet)
    );
    println!();

    if !stats.records_by_sitemap.is_empty() {
        println!("Pages by Sitemap ({}):", stats.records_by_sitemap.len());
        for (sitemap, count) in &stats.records_by_sitemap {
            println!("  {}: {}", sitemap, count);
        }
    }
}
