//! Write operations for titles, source links, chapters, and library state.
//!
//! Every function takes the connection explicitly. Functions that touch more
//! than one row open their own transaction; the rest leave transaction
//! boundaries to the caller so several writes can be grouped.

use chrono::{SecondsFormat, Utc};
use kaze_catalog::{
    LibraryUpdate, NewChapter, NewSourceLink, NewTitle, Provider, ReadingProgress, TitleRefresh,
};
use rusqlite::{ffi, params, Connection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Entity not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },
    #[error("Slug already taken: '{0}'")]
    DuplicateSlug(String),
    #[error("Source link already exists: {provider}/{provider_id}")]
    DuplicateSourceLink { provider: Provider, provider_id: String },
    #[error("Title '{title_id}' is already linked to {provider}")]
    ProviderAlreadyLinked { title_id: String, provider: Provider },
    #[error("User '{user_id}' already tracks title '{title_id}'")]
    DuplicateLibraryEntry { user_id: String, title_id: String },
}

impl OperationError {
    /// True for uniqueness conflicts that a concurrent writer can cause.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            OperationError::DuplicateSlug(_)
                | OperationError::DuplicateSourceLink { .. }
                | OperationError::ProviderAlreadyLinked { .. }
                | OperationError::DuplicateLibraryEntry { .. }
        )
    }
}

/// Current time as an RFC 3339 UTC timestamp with millisecond precision.
///
/// Fixed width, so lexical order in the database equals chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Constraint Classification ───────────────────────────────────────────────

/// The constraint message of a uniqueness or primary-key violation, if `err` is one.
fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Some(msg.as_str())
        }
        _ => None,
    }
}

/// True when `err` violates a uniqueness constraint whose message names `column`.
fn violates(err: &rusqlite::Error, column: &str) -> bool {
    unique_violation(err).is_some_and(|msg| msg.contains(column))
}

fn classify_link_conflict(err: rusqlite::Error, link: &NewSourceLink) -> OperationError {
    if violates(&err, "source_links.title_id") {
        OperationError::ProviderAlreadyLinked {
            title_id: link.title_id.clone(),
            provider: link.provider,
        }
    } else if violates(&err, "source_links.provider_id") {
        OperationError::DuplicateSourceLink {
            provider: link.provider,
            provider_id: link.provider_id.clone(),
        }
    } else {
        err.into()
    }
}

// ── Title Operations ────────────────────────────────────────────────────────

/// Insert a new title together with its first, preferred source link.
///
/// Both rows are written in one transaction: either both exist afterwards or
/// neither does. A slug or link already taken by another writer surfaces as
/// `DuplicateSlug` / `DuplicateSourceLink`.
pub fn insert_title_with_link(
    conn: &Connection,
    title: &NewTitle,
    link: &NewSourceLink,
    now: &str,
) -> Result<(), OperationError> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO titles (id, slug, title, author, description, cover_url, status, genres,
             chapters_count, last_checked_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, ?9, ?9)",
        params![
            title.id,
            title.slug,
            title.title,
            title.author,
            title.description,
            title.cover_url,
            title.status.as_str(),
            serde_json::to_string(&title.genres)?,
            now,
        ],
    )
    .map_err(|e| {
        if violates(&e, "titles.slug") {
            OperationError::DuplicateSlug(title.slug.clone())
        } else {
            e.into()
        }
    })?;

    insert_source_link(&tx, link, true, now)?;

    tx.commit()?;
    Ok(())
}

/// Refresh provider-sourced metadata on an existing title.
///
/// Fields left `None` keep their stored value. Returns whether anything
/// actually changed.
pub fn refresh_title_metadata(
    conn: &Connection,
    title_id: &str,
    refresh: &TitleRefresh,
    now: &str,
) -> Result<bool, OperationError> {
    let genres = refresh
        .genres
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let changed = conn.execute(
        "UPDATE titles SET
             author = COALESCE(?2, author),
             description = COALESCE(?3, description),
             cover_url = COALESCE(?4, cover_url),
             status = COALESCE(?5, status),
             genres = COALESCE(?6, genres),
             updated_at = ?7
         WHERE id = ?1
           AND (author IS NOT COALESCE(?2, author)
                OR description IS NOT COALESCE(?3, description)
                OR cover_url IS NOT COALESCE(?4, cover_url)
                OR status IS NOT COALESCE(?5, status)
                OR genres IS NOT COALESCE(?6, genres))",
        params![
            title_id,
            refresh.author,
            refresh.description,
            refresh.cover_url,
            refresh.status.map(|s| s.as_str()),
            genres,
            now,
        ],
    )?;
    Ok(changed > 0)
}

/// Record a successful check: cache the reported chapter count and reset staleness.
pub fn mark_title_checked(
    conn: &Connection,
    title_id: &str,
    chapters_count: u32,
    now: &str,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE titles SET chapters_count = ?2, last_checked_at = ?3, updated_at = ?3 WHERE id = ?1",
        params![title_id, chapters_count, now],
    )?;
    if changed == 0 {
        return Err(OperationError::NotFound {
            entity_type: "title".to_string(),
            id: title_id.to_string(),
        });
    }
    Ok(())
}

// ── Source Link Operations ──────────────────────────────────────────────────

/// Link a provider representation to a title.
pub fn insert_source_link(
    conn: &Connection,
    link: &NewSourceLink,
    preferred: bool,
    now: &str,
) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO source_links (title_id, provider, provider_id, url, preferred, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            link.title_id,
            link.provider.as_str(),
            link.provider_id,
            link.url,
            preferred,
            now,
        ],
    )
    .map_err(|e| classify_link_conflict(e, link))?;
    Ok(())
}

/// Make the title's link for `provider` the preferred one, clearing the flag
/// on every other link of the title in the same transaction.
pub fn set_preferred_link(
    conn: &Connection,
    title_id: &str,
    provider: Provider,
) -> Result<(), OperationError> {
    let tx = conn.unchecked_transaction()?;

    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM source_links WHERE title_id = ?1 AND provider = ?2)",
        params![title_id, provider.as_str()],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(OperationError::NotFound {
            entity_type: "source link".to_string(),
            id: format!("{title_id}/{provider}"),
        });
    }

    tx.execute(
        "UPDATE source_links SET preferred = (provider = ?2) WHERE title_id = ?1",
        params![title_id, provider.as_str()],
    )?;

    tx.commit()?;
    Ok(())
}

/// Stamp the per-provider last-checked time on a link.
pub fn mark_link_checked(
    conn: &Connection,
    provider: Provider,
    provider_id: &str,
    now: &str,
) -> Result<(), OperationError> {
    conn.execute(
        "UPDATE source_links SET last_checked_at = ?3 WHERE provider = ?1 AND provider_id = ?2",
        params![provider.as_str(), provider_id, now],
    )?;
    Ok(())
}

// ── Chapter Operations ──────────────────────────────────────────────────────

/// Insert chapters, skipping any whose (title, index) already exists.
///
/// Returns the number of rows actually inserted, which is less than
/// `chapters.len()` when a concurrent sync got there first.
pub fn insert_chapters(
    conn: &Connection,
    chapters: &[NewChapter],
    now: &str,
) -> Result<usize, OperationError> {
    let mut stmt = conn.prepare(
        "INSERT INTO chapters (id, title_id, provider, provider_chapter_id, idx, title,
             released_at, pages, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT DO NOTHING",
    )?;

    let mut inserted = 0;
    for chapter in chapters {
        inserted += stmt.execute(params![
            chapter.id,
            chapter.title_id,
            chapter.provider.as_str(),
            chapter.provider_chapter_id,
            chapter.index.value(),
            chapter.title,
            chapter.released_at,
            serde_json::to_string(&chapter.pages)?,
            now,
        ])?;
    }
    Ok(inserted)
}

/// Fill in the page list of a chapter that was stored without one.
///
/// Chapters are otherwise immutable, so a chapter that already has pages is
/// left untouched. Returns whether the pages were written.
pub fn backfill_chapter_pages(
    conn: &Connection,
    chapter_id: &str,
    pages: &[String],
) -> Result<bool, OperationError> {
    let changed = conn.execute(
        "UPDATE chapters SET pages = ?2 WHERE id = ?1 AND pages = '[]'",
        params![chapter_id, serde_json::to_string(pages)?],
    )?;
    Ok(changed > 0)
}

// ── Library Operations ──────────────────────────────────────────────────────

/// Mark every library entry of a title as having unseen chapters.
pub fn flag_unseen_for_title(conn: &Connection, title_id: &str) -> Result<usize, OperationError> {
    let changed = conn.execute(
        "UPDATE library_entries SET has_unseen = 1 WHERE title_id = ?1 AND has_unseen = 0",
        params![title_id],
    )?;
    Ok(changed)
}

/// Start tracking a title for a user.
pub fn insert_library_entry(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
    now: &str,
) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO library_entries (user_id, title_id, added_at) VALUES (?1, ?2, ?3)",
        params![user_id, title_id, now],
    )
    .map_err(|e| {
        if unique_violation(&e).is_some() {
            OperationError::DuplicateLibraryEntry {
                user_id: user_id.to_string(),
                title_id: title_id.to_string(),
            }
        } else {
            e.into()
        }
    })?;
    Ok(())
}

/// Stop tracking a title. Returns whether a row was removed.
pub fn delete_library_entry(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
) -> Result<bool, OperationError> {
    let changed = conn.execute(
        "DELETE FROM library_entries WHERE user_id = ?1 AND title_id = ?2",
        params![user_id, title_id],
    )?;
    Ok(changed > 0)
}

/// Apply a partial update to the user-editable fields of an entry.
///
/// Returns `false` when the user does not track the title.
pub fn update_library_entry(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
    update: &LibraryUpdate,
) -> Result<bool, OperationError> {
    let changed = conn.execute(
        "UPDATE library_entries SET
             favourite = COALESCE(?3, favourite),
             rating = CASE WHEN ?4 THEN ?5 ELSE rating END,
             notes = CASE WHEN ?6 THEN ?7 ELSE notes END
         WHERE user_id = ?1 AND title_id = ?2",
        params![
            user_id,
            title_id,
            update.favourite,
            update.rating.is_some(),
            update.rating.flatten(),
            update.notes.is_some(),
            update.notes.clone().flatten(),
        ],
    )?;
    Ok(changed > 0)
}

/// Point an entry's last-read marker at a chapter, optionally clearing the
/// unseen flag. Returns `false` when the user does not track the title.
pub fn set_last_read(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
    chapter_id: &str,
    clear_unseen: bool,
) -> Result<bool, OperationError> {
    let changed = conn.execute(
        "UPDATE library_entries SET
             last_read_chapter_id = ?3,
             has_unseen = CASE WHEN ?4 THEN 0 ELSE has_unseen END
         WHERE user_id = ?1 AND title_id = ?2",
        params![user_id, title_id, chapter_id, clear_unseen],
    )?;
    Ok(changed > 0)
}

// ── Reading Progress Operations ─────────────────────────────────────────────

/// Insert or update the reading position for (user, chapter).
pub fn upsert_reading_progress(
    conn: &Connection,
    progress: &ReadingProgress,
) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO reading_progress (user_id, chapter_id, percentage, completed, last_read_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, chapter_id) DO UPDATE SET
             percentage = excluded.percentage,
             completed = excluded.completed,
             last_read_at = excluded.last_read_at",
        params![
            progress.user_id,
            progress.chapter_id,
            progress.percentage,
            progress.completed,
            progress.last_read_at,
        ],
    )?;
    Ok(())
}
