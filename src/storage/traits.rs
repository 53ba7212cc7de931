//! Storage traits and error types
//!
//! The two sinks are independent failure domains: the dispatcher writes to
//! both for every page and handles each result on its own.

use crate::storage::PageRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only sink for compact page records
///
/// At-least-once semantics: a record may be appended again on a re-crawl.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Appends one record
    async fn append(&self, record: &PageRecord) -> StorageResult<()>;
}

/// Key/value store for full page documents
///
/// `put` overwrites any existing value under the same key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `value` under `key`
    async fn put(&self, key: &str, value: &serde_json::Value) -> StorageResult<()>;

    /// Reads the value stored under `key`, if any
    async fn get(&self, key: &str) -> StorageResult<Option<serde_json::Value>>;
}
