//! SQLite row store
//!
//! Holds the `runs` table and the append-only `page_records` table. The
//! connection sits behind a mutex so one store can be shared by every worker.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use crate::storage::{PageRecord, RunRecord, RunStatus, StoredRecord};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite storage backend for page records and runs
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRecordStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Sets the status of a run, stamping the finish time for terminal states
    pub fn update_run_status(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let finished_at = match status {
            RunStatus::Running => None,
            _ => Some(Utc::now().to_rfc3339()),
        };
        let updated = self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Marks a run as completed with a finish timestamp
    pub fn complete_run(&self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Page Records =====

    /// Appends a page record to a run
    pub fn append_record(&self, run_id: i64, record: &PageRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO page_records (run_id, url, sitemap, title, meta_description, snippet, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                record.url,
                record.sitemap,
                record.title,
                record.meta_description,
                record.snippet,
                now
            ],
        )?;
        Ok(())
    }

    /// Returns a [`RecordSink`] that appends to the given run
    pub fn sink_for_run(self: &Arc<Self>, run_id: i64) -> RunRecordSink {
        RunRecordSink {
            store: Arc::clone(self),
            run_id,
        }
    }

    // ===== Statistics =====

    /// Counts records written by a run
    pub fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM page_records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Counts records with a non-empty value in `column` for a run
    fn count_non_empty(&self, run_id: i64, column: &str) -> StorageResult<u64> {
        let query = format!(
            "SELECT COUNT(*) FROM page_records WHERE run_id = ?1 AND {} != ''",
            column
        );
        let count: i64 = self
            .conn()
            .query_row(&query, params![run_id], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Counts records of a run that have a title
    pub fn count_records_with_title(&self, run_id: i64) -> StorageResult<u64> {
        self.count_non_empty(run_id, "title")
    }

    /// Counts records of a run that have a meta description
    pub fn count_records_with_description(&self, run_id: i64) -> StorageResult<u64> {
        self.count_non_empty(run_id, "meta_description")
    }

    /// Counts records of a run that have a snippet
    pub fn count_records_with_snippet(&self, run_id: i64) -> StorageResult<u64> {
        self.count_non_empty(run_id, "snippet")
    }

    /// Record counts per source sitemap for a run, largest first
    pub fn count_records_by_sitemap(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT sitemap, COUNT(*) AS count
             FROM page_records
             WHERE run_id = ?1
             GROUP BY sitemap
             ORDER BY count DESC, sitemap",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// All records of a run in insertion order
    pub fn get_records_for_run(&self, run_id: i64) -> StorageResult<Vec<StoredRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, recorded_at, url, sitemap, title, meta_description, snippet
             FROM page_records
             WHERE run_id = ?1
             ORDER BY id",
        )?;

        let records = stmt
            .query_map(params![run_id], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    recorded_at: row.get(2)?,
                    record: PageRecord {
                        url: row.get(3)?,
                        sitemap: row.get(4)?,
                        title: row.get(5)?,
                        meta_description: row.get(6)?,
                        snippet: row.get(7)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

/// [`RecordSink`] bound to one run of a [`SqliteRecordStore`]
#[derive(Clone)]
pub struct RunRecordSink {
    store: Arc<SqliteRecordStore>,
    run_id: i64,
}

impl RunRecordSink {
    pub fn run_id(&self) -> i64 {
        self.run_id
    }
}

#[async_trait]
impl RecordSink for RunRecordSink {
    async fn append(&self, record: &PageRecord) -> StorageResult<()> {
        let store = Arc::clone(&self.store);
        let run_id = self.run_id;
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.append_record(run_id, &record)).await?
    }
}
