//! Storage module for persisting crawl results
//!
//! Every fetched page is written to two independent sinks:
//! - A row store of compact [`PageRecord`]s (SQLite), which also tracks runs
//! - A key/value blob store of full [`PageDocument`]s (JSON files)
//!
//! The crawler only sees the [`RecordSink`] and [`BlobStore`] traits.

mod blob;
mod schema;
mod sqlite;
mod traits;

pub use blob::{blob_key_for_url, FsBlobStore, PAGE_KEY_PREFIX};
pub use sqlite::{RunRecordSink, SqliteRecordStore};
pub use traits::{BlobStore, RecordSink, StorageError, StorageResult};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opens (or creates) the row store database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRecordStore)` - Successfully opened store
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> StorageResult<SqliteRecordStore> {
    SqliteRecordStore::new(path)
}

/// Compact per-page record written to the row store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    pub url: String,
    pub sitemap: String,
    pub meta_description: String,
    pub snippet: String,
}

/// Full per-page document written to the blob store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDocument {
    pub url: String,
    pub sitemap: String,
    pub title: String,
    pub meta_description: String,
    pub snippet: String,

    /// URL the page was finally served from, after redirects
    pub loaded_url: String,

    /// Link distance from the sitemap seed
    pub depth: u32,

    /// Time the document was produced (RFC 3339, UTC)
    pub timestamp: String,
}

impl PageDocument {
    /// Builds the full document for a record, stamped with the current time
    pub fn from_record(record: &PageRecord, loaded_url: &str, depth: u32) -> Self {
        Self {
            url: record.url.clone(),
            sitemap: record.sitemap.clone(),
            title: record.title.clone(),
            meta_description: record.meta_description.clone(),
            snippet: record.snippet.clone(),
            loaded_url: loaded_url.to_string(),
            depth,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// A page record as read back from the row store
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub run_id: i64,
    pub recorded_at: String,
    pub record: PageRecord,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_document_json_layout() {
        let record = PageRecord {
            title: "Title".to_string(),
            url: "https://ex.com/a".to_string(),
            sitemap: "https://ex.com/sitemap.xml".to_string(),
            meta_description: "Description".to_string(),
            snippet: String::new(),
        };
        let document = PageDocument::from_record(&record, "https://ex.com/a/", 1);
        let json = serde_json::to_value(&document).unwrap();

        assert_eq!(json["url"], "https://ex.com/a");
        assert_eq!(json["meta_description"], "Description");
        assert_eq!(json["loaded_url"], "https://ex.com/a/");
        assert_eq!(json["depth"], 1);
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
        assert!(document.timestamp.ends_with('Z'));
    }
}
