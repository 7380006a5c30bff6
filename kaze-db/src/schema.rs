//! SQLite schema creation and version check.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Unsupported schema version: expected at most {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// How long a writer waits on a locked database before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create all tables and indexes if they don't exist.
///
/// This is idempotent, safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_SQL)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Open or create a title database at the given path.
///
/// Several processes may hold the same file open (a scheduled batch and an
/// interactive import, say), so the connection waits on locks instead of
/// failing immediately.
pub fn open_database(path: &Path) -> Result<Connection, SchemaError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: version,
        });
    }

    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Get the current schema version, or 0 if no schema exists.
pub fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Canonical titles
CREATE TABLE IF NOT EXISTS titles (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL,
    title TEXT NOT NULL,
    author TEXT,
    description TEXT,
    cover_url TEXT,
    status TEXT NOT NULL DEFAULT 'unknown',
    genres TEXT NOT NULL DEFAULT '[]',
    chapters_count INTEGER NOT NULL DEFAULT 0,
    last_checked_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_titles_slug ON titles(slug);
CREATE INDEX IF NOT EXISTS idx_titles_title_lower ON titles(LOWER(title));
CREATE INDEX IF NOT EXISTS idx_titles_last_checked ON titles(last_checked_at, created_at);

-- Per-provider representations of a title
CREATE TABLE IF NOT EXISTS source_links (
    title_id TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    url TEXT,
    preferred BOOLEAN NOT NULL DEFAULT 0,
    last_checked_at TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (provider, provider_id),
    UNIQUE (title_id, provider)
);

CREATE INDEX IF NOT EXISTS idx_source_links_title ON source_links(title_id);

-- Chapters, keyed by position within their title
CREATE TABLE IF NOT EXISTS chapters (
    id TEXT PRIMARY KEY,
    title_id TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    provider_chapter_id TEXT NOT NULL,
    idx REAL NOT NULL,
    title TEXT,
    released_at TEXT,
    pages TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    UNIQUE (title_id, idx)
);

-- Per-user tracked titles
CREATE TABLE IF NOT EXISTS library_entries (
    user_id TEXT NOT NULL,
    title_id TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    favourite BOOLEAN NOT NULL DEFAULT 0,
    has_unseen BOOLEAN NOT NULL DEFAULT 0,
    last_read_chapter_id TEXT REFERENCES chapters(id) ON DELETE SET NULL,
    rating INTEGER,
    notes TEXT,
    added_at TEXT NOT NULL,
    PRIMARY KEY (user_id, title_id)
);

-- Per-user, per-chapter reading position
CREATE TABLE IF NOT EXISTS reading_progress (
    user_id TEXT NOT NULL,
    chapter_id TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
    percentage REAL NOT NULL DEFAULT 0,
    completed BOOLEAN NOT NULL DEFAULT 0,
    last_read_at TEXT NOT NULL,
    PRIMARY KEY (user_id, chapter_id)
);

CREATE INDEX IF NOT EXISTS idx_reading_progress_chapter ON reading_progress(chapter_id);
"#;
