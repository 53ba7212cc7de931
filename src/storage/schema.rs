//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the row store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One compact record per fetched page, append-only
CREATE TABLE IF NOT EXISTS page_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    sitemap TEXT NOT NULL,
    title TEXT NOT NULL,
    meta_description TEXT NOT NULL,
    snippet TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_records_run ON page_records(run_id);
CREATE INDEX IF NOT EXISTS idx_page_records_url ON page_records(url);
CREATE INDEX IF NOT EXISTS idx_page_records_sitemap ON page_records(sitemap);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
