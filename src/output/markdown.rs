//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a crawl run:
//! run metadata, metadata coverage and the per-sitemap breakdown.

use crate::output::stats::CrawlStatistics;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
///
/// # Arguments
///
/// * `stats` - The run statistics
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(stats: &CrawlStatistics, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(stats);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats run statistics as markdown
pub fn format_markdown_summary(stats: &CrawlStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Sitemap-Harvester Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", stats.run.id));
    md.push_str(&format!("- **Started**: {}\n", stats.run.started_at));
    if let Some(finished) = &stats.run.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = stats.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", stats.run.status.to_db_string()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", stats.run.config_hash));

    // Metadata coverage
    md.push_str("## Pages\n\n");
    md.push_str(&format!("- **Pages Recorded**: {}\n\n", stats.total_records));
    md.push_str("| Field | Pages | Coverage |\n");
    md.push_str("|-------|-------|----------|\n");
    for (field, count) in [
        ("Title", stats.with_title),
        ("Meta Description", stats.with_description),
        ("Snippet", stats.with_snippet),
    ] {
        md.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            field,
            count,
            stats.coverage(count)
        ));
    }
    md.push('\n');

    // Per-sitemap breakdown
    if !stats.records_by_sitemap.is_empty() {
        md.push_str("## Pages by Sitemap\n\n");
        md.push_str("| Sitemap | Pages |\n");
        md.push_str("|---------|-------|\n");
        for (sitemap, count) in &stats.records_by_sitemap {
            md.push_str(&format!("| {} | {} |\n", sitemap, count));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str(&format!(
        "*Generated by Sitemap-Harvester v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    md
}
