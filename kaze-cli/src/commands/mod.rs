pub(crate) mod import;
pub(crate) mod library;
pub(crate) mod serve;
pub(crate) mod sync;
pub(crate) mod titles;

use std::path::PathBuf;

use kaze_catalog::{Chapter, ChapterIndex, Title};
use kaze_connector::ConnectorRegistry;
use kaze_sync::Settings;
use rusqlite::Connection;

use crate::CliError;

/// Settings and resolved paths shared by every command.
pub(crate) struct Context {
    pub settings: Settings,
    pub db_path: PathBuf,
}

impl Context {
    pub(crate) fn load(db_override: Option<PathBuf>) -> Result<Self, CliError> {
        let settings = Settings::load().map_err(|e| CliError::config(e.to_string()))?;
        let db_path = db_override.unwrap_or_else(|| settings.database_path());
        Ok(Self { settings, db_path })
    }

    /// Open (creating if needed) the database.
    pub(crate) fn open_db(&self) -> Result<Connection, CliError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::database(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        kaze_db::open_database(&self.db_path)
            .map_err(|e| CliError::database(format!("Failed to open database: {}", e)))
    }

    pub(crate) fn registry(&self) -> Result<ConnectorRegistry, CliError> {
        ConnectorRegistry::with_defaults(&self.settings.http_config())
            .map_err(|e| CliError::runtime(format!("Failed to build HTTP client: {}", e)))
    }
}

pub(crate) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("Failed to create tokio runtime")
}

pub(crate) fn find_title(conn: &Connection, slug: &str) -> Result<Title, CliError> {
    kaze_db::get_title_by_slug(conn, slug)?
        .ok_or_else(|| CliError::not_found(format!("no title with slug '{}'", slug)))
}

pub(crate) fn find_chapter(
    conn: &Connection,
    title: &Title,
    index: ChapterIndex,
) -> Result<Chapter, CliError> {
    kaze_db::find_chapter(conn, &title.id, index)?
        .ok_or_else(|| CliError::not_found(format!("'{}' has no chapter {}", title.slug, index)))
}

/// Truncate a string to a maximum width, appending "..." if needed.
pub(crate) fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
