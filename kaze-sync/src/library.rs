//! Per-user library and reading progress.
//!
//! Expected states such as "already tracking" are outcomes, not errors.

use kaze_catalog::{LibraryEntry, LibraryUpdate, ReadingProgress, Title};
use kaze_db::{operations, queries, OperationError};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::SyncError;

/// Percentage at or above which a chapter counts as completed.
pub const COMPLETION_THRESHOLD: f64 = 98.0;

/// Highest accepted user rating.
pub const MAX_RATING: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyTracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotTracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotTracking,
}

/// A library entry as shown to its user.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryItem {
    pub entry: LibraryEntry,
    pub title: Title,
    /// Stored chapters up to and including the last-read one.
    pub read_position: u32,
    pub has_new_chapter: bool,
}

fn require_user(user_id: &str) -> Result<(), SyncError> {
    if user_id.trim().is_empty() {
        return Err(SyncError::Validation("missing user id".to_string()));
    }
    Ok(())
}

fn require_title(conn: &Connection, title_id: &str) -> Result<Title, SyncError> {
    queries::get_title(conn, title_id)?.ok_or_else(|| SyncError::TitleNotFound(title_id.to_string()))
}

/// Start tracking a title.
pub fn add_to_library(conn: &Connection, user_id: &str, title_id: &str) -> Result<AddOutcome, SyncError> {
    require_user(user_id)?;
    require_title(conn, title_id)?;
    match operations::insert_library_entry(conn, user_id, title_id, &operations::now_timestamp()) {
        Ok(()) => Ok(AddOutcome::Added),
        Err(OperationError::DuplicateLibraryEntry { .. }) => Ok(AddOutcome::AlreadyTracking),
        Err(e) => Err(e.into()),
    }
}

/// Stop tracking a title. Not tracking it in the first place is fine.
pub fn remove_from_library(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
) -> Result<RemoveOutcome, SyncError> {
    require_user(user_id)?;
    if operations::delete_library_entry(conn, user_id, title_id)? {
        Ok(RemoveOutcome::Removed)
    } else {
        Ok(RemoveOutcome::NotTracking)
    }
}

/// Record a page-view event for a chapter.
///
/// The progress row is upserted whether or not the title is in the user's
/// library. When it is, the entry's last-read marker moves to this chapter,
/// and reading the latest chapter clears the unseen flag.
pub fn record_progress(
    conn: &Connection,
    user_id: &str,
    chapter_id: &str,
    percentage: f64,
) -> Result<ReadingProgress, SyncError> {
    require_user(user_id)?;
    if !(0.0..=100.0).contains(&percentage) {
        return Err(SyncError::Validation(format!(
            "percentage must be between 0 and 100, got {percentage}"
        )));
    }
    let chapter = queries::get_chapter(conn, chapter_id)?
        .ok_or_else(|| SyncError::ChapterNotFound(chapter_id.to_string()))?;

    let progress = ReadingProgress {
        user_id: user_id.to_string(),
        chapter_id: chapter.id.clone(),
        percentage,
        completed: percentage >= COMPLETION_THRESHOLD,
        last_read_at: operations::now_timestamp(),
    };

    let tx = conn.unchecked_transaction()?;
    operations::upsert_reading_progress(&tx, &progress)?;
    let is_latest = queries::latest_chapter(&tx, &chapter.title_id)?
        .is_some_and(|latest| latest.id == chapter.id);
    if operations::set_last_read(&tx, user_id, &chapter.title_id, &chapter.id, is_latest)? {
        log::debug!("{user_id}: last read '{}' chapter {}", chapter.title_id, chapter.index);
    }
    tx.commit()?;

    Ok(progress)
}

/// Point the last-read marker of a tracked title at one of its chapters.
///
/// The marker may move backwards; re-reading an old chapter is allowed.
pub fn update_last_read(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
    chapter_id: &str,
) -> Result<UpdateOutcome, SyncError> {
    require_user(user_id)?;
    let chapter = queries::get_chapter(conn, chapter_id)?
        .filter(|c| c.title_id == title_id)
        .ok_or_else(|| SyncError::ChapterNotFound(chapter_id.to_string()))?;
    let is_latest = queries::latest_chapter(conn, title_id)?.is_some_and(|l| l.id == chapter.id);
    if operations::set_last_read(conn, user_id, title_id, &chapter.id, is_latest)? {
        Ok(UpdateOutcome::Updated)
    } else {
        Ok(UpdateOutcome::NotTracking)
    }
}

/// Change favourite, rating, or notes on a tracked title.
pub fn update_entry(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
    update: &LibraryUpdate,
) -> Result<UpdateOutcome, SyncError> {
    require_user(user_id)?;
    if let Some(Some(rating)) = update.rating {
        if rating > MAX_RATING {
            return Err(SyncError::Validation(format!(
                "rating must be between 0 and {MAX_RATING}, got {rating}"
            )));
        }
    }
    if operations::update_library_entry(conn, user_id, title_id, update)? {
        Ok(UpdateOutcome::Updated)
    } else {
        Ok(UpdateOutcome::NotTracking)
    }
}

/// True when the provider has more chapters than the user has read through.
pub fn has_new_chapter(chapters_count: u32, read_position: u32) -> bool {
    chapters_count > read_position
}

/// Every title a user tracks, with the derived new-chapter flag.
pub fn list_library(conn: &Connection, user_id: &str) -> Result<Vec<LibraryItem>, SyncError> {
    require_user(user_id)?;
    let rows = queries::library_for_user(conn, user_id)?;
    Ok(rows
        .into_iter()
        .map(|row| LibraryItem {
            has_new_chapter: has_new_chapter(row.title.chapters_count, row.read_position),
            read_position: row.read_position,
            entry: row.entry,
            title: row.title,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chapter_compares_against_read_position() {
        assert!(has_new_chapter(3, 2));
        assert!(!has_new_chapter(3, 3));
        assert!(!has_new_chapter(0, 0));
        // count lagging behind local chapters is not "new"
        assert!(!has_new_chapter(2, 5));
    }
}
