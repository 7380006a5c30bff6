//! Read-only queries over the title store.

use std::collections::HashSet;

use kaze_catalog::{
    Chapter, ChapterIndex, ChapterOrder, LibraryEntry, Provider, ReadingProgress, SourceLink, Title,
    TitleStatus,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::operations::OperationError;

/// Shortest query `search_titles` will run.
pub const MIN_SEARCH_LEN: usize = 3;

/// Most results `search_titles` returns.
pub const MAX_SEARCH_RESULTS: u32 = 10;

const TITLE_COLUMNS: &str = "t.id, t.slug, t.title, t.author, t.description, t.cover_url, t.status,
     t.genres, t.chapters_count, t.last_checked_at, t.created_at, t.updated_at";

const LINK_COLUMNS: &str =
    "title_id, provider, provider_id, url, preferred, last_checked_at, created_at";

const CHAPTER_COLUMNS: &str =
    "id, title_id, provider, provider_chapter_id, idx, title, released_at, pages, created_at";

const ENTRY_COLUMNS: &str = "l.user_id, l.title_id, l.favourite, l.has_unseen,
     l.last_read_chapter_id, l.rating, l.notes, l.added_at";

// ── Title Queries ───────────────────────────────────────────────────────────

/// Look up a title by id.
pub fn get_title(conn: &Connection, id: &str) -> Result<Option<Title>, OperationError> {
    let sql = format!("SELECT {TITLE_COLUMNS} FROM titles t WHERE t.id = ?1");
    conn.query_row(&sql, params![id], row_to_title)
        .optional()
        .map_err(Into::into)
}

/// Look up a title by its slug.
pub fn get_title_by_slug(conn: &Connection, slug: &str) -> Result<Option<Title>, OperationError> {
    let sql = format!("SELECT {TITLE_COLUMNS} FROM titles t WHERE t.slug = ?1");
    conn.query_row(&sql, params![slug], row_to_title)
        .optional()
        .map_err(Into::into)
}

/// Find an existing title that a newly discovered work should merge into:
/// exact slug match, or case-insensitive exact display-title match.
///
/// A slug match wins over a title match; among equals the oldest title wins.
pub fn find_title_match(
    conn: &Connection,
    slug: &str,
    display_title: &str,
) -> Result<Option<Title>, OperationError> {
    let sql = format!(
        "SELECT {TITLE_COLUMNS} FROM titles t
         WHERE t.slug = ?1 OR LOWER(t.title) = LOWER(?2)
         ORDER BY (t.slug = ?1) DESC, t.created_at ASC
         LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let result = stmt.query_row(params![slug, display_title], row_to_title);
    match result {
        Ok(title) => Ok(Some(title)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether a slug is already taken.
pub fn slug_exists(conn: &Connection, slug: &str) -> Result<bool, OperationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM titles WHERE slug = ?1)",
        params![slug],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// All titles, alphabetically.
pub fn list_titles(conn: &Connection) -> Result<Vec<Title>, OperationError> {
    let sql = format!("SELECT {TITLE_COLUMNS} FROM titles t ORDER BY t.title COLLATE NOCASE");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_title)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Case-insensitive substring search over display title and author.
///
/// Queries shorter than [`MIN_SEARCH_LEN`] characters return nothing.
pub fn search_titles(conn: &Connection, query: &str) -> Result<Vec<Title>, OperationError> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_LEN {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", escape_like(query));
    let sql = format!(
        "SELECT {TITLE_COLUMNS} FROM titles t
         WHERE t.title LIKE ?1 ESCAPE '\\' OR t.author LIKE ?1 ESCAPE '\\'
         ORDER BY t.title COLLATE NOCASE
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern, MAX_SEARCH_RESULTS], row_to_title)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Up to `limit` titles in staleness order: never-checked first, then oldest
/// check first. Ties go to the title created first.
pub fn stale_titles(conn: &Connection, limit: u32) -> Result<Vec<Title>, OperationError> {
    let sql = format!(
        "SELECT {TITLE_COLUMNS} FROM titles t
         ORDER BY t.last_checked_at ASC NULLS FIRST, t.created_at ASC
         LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], row_to_title)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── Source Link Queries ─────────────────────────────────────────────────────

/// Look up the link for an exact (provider, provider id) pair.
pub fn find_link(
    conn: &Connection,
    provider: Provider,
    provider_id: &str,
) -> Result<Option<SourceLink>, OperationError> {
    let sql = format!("SELECT {LINK_COLUMNS} FROM source_links WHERE provider = ?1 AND provider_id = ?2");
    conn.query_row(&sql, params![provider.as_str(), provider_id], row_to_link)
        .optional()
        .map_err(Into::into)
}

/// All links of a title, preferred first, then in creation order.
pub fn links_for_title(conn: &Connection, title_id: &str) -> Result<Vec<SourceLink>, OperationError> {
    let sql = format!(
        "SELECT {LINK_COLUMNS} FROM source_links
         WHERE title_id = ?1
         ORDER BY preferred DESC, created_at ASC, provider ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![title_id], row_to_link)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// The link a sync should use: the preferred one, or the oldest link when
/// none is flagged.
pub fn preferred_link(conn: &Connection, title_id: &str) -> Result<Option<SourceLink>, OperationError> {
    Ok(links_for_title(conn, title_id)?.into_iter().next())
}

// ── Chapter Queries ─────────────────────────────────────────────────────────

/// Every chapter index stored for a title.
pub fn chapter_indices(
    conn: &Connection,
    title_id: &str,
) -> Result<HashSet<ChapterIndex>, OperationError> {
    let mut stmt = conn.prepare("SELECT idx FROM chapters WHERE title_id = ?1")?;
    let rows = stmt.query_map(params![title_id], |row| index_at(row, 0))?;
    rows.collect::<Result<HashSet<_>, _>>().map_err(Into::into)
}

/// Number of chapters stored for a title.
pub fn count_chapters(conn: &Connection, title_id: &str) -> Result<u32, OperationError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM chapters WHERE title_id = ?1",
        params![title_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Chapters of a title in numeric index order.
pub fn chapters_for_title(
    conn: &Connection,
    title_id: &str,
    order: ChapterOrder,
) -> Result<Vec<Chapter>, OperationError> {
    let direction = match order {
        ChapterOrder::Ascending => "ASC",
        ChapterOrder::Descending => "DESC",
    };
    let sql = format!(
        "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE title_id = ?1 ORDER BY idx {direction}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![title_id], row_to_chapter)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Look up a chapter by id.
pub fn get_chapter(conn: &Connection, id: &str) -> Result<Option<Chapter>, OperationError> {
    let sql = format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_chapter)
        .optional()
        .map_err(Into::into)
}

/// Look up a chapter by its position within a title.
pub fn find_chapter(
    conn: &Connection,
    title_id: &str,
    index: ChapterIndex,
) -> Result<Option<Chapter>, OperationError> {
    let sql = format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE title_id = ?1 AND idx = ?2");
    conn.query_row(&sql, params![title_id, index.value()], row_to_chapter)
        .optional()
        .map_err(Into::into)
}

/// The highest-indexed chapter of a title.
pub fn latest_chapter(conn: &Connection, title_id: &str) -> Result<Option<Chapter>, OperationError> {
    let sql = format!(
        "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE title_id = ?1 ORDER BY idx DESC LIMIT 1"
    );
    conn.query_row(&sql, params![title_id], row_to_chapter)
        .optional()
        .map_err(Into::into)
}

// ── Library Queries ─────────────────────────────────────────────────────────

/// A library entry joined with its title.
#[derive(Debug, Clone)]
pub struct LibraryRow {
    pub entry: LibraryEntry,
    pub title: Title,
    /// Number of stored chapters at or before the last-read chapter.
    pub read_position: u32,
}

/// Look up a single library entry.
pub fn get_library_entry(
    conn: &Connection,
    user_id: &str,
    title_id: &str,
) -> Result<Option<LibraryEntry>, OperationError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM library_entries l WHERE l.user_id = ?1 AND l.title_id = ?2"
    );
    conn.query_row(&sql, params![user_id, title_id], |row| row_to_entry(row, 0))
        .optional()
        .map_err(Into::into)
}

/// Every title a user tracks, most recently added first.
pub fn library_for_user(conn: &Connection, user_id: &str) -> Result<Vec<LibraryRow>, OperationError> {
    let sql = format!(
        "SELECT {TITLE_COLUMNS}, {ENTRY_COLUMNS},
             (SELECT COUNT(*) FROM chapters c
              WHERE c.title_id = t.id
                AND c.idx <= (SELECT r.idx FROM chapters r WHERE r.id = l.last_read_chapter_id))
         FROM library_entries l
         JOIN titles t ON t.id = l.title_id
         WHERE l.user_id = ?1
         ORDER BY l.added_at DESC, t.title COLLATE NOCASE"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(LibraryRow {
            title: row_to_title(row)?,
            entry: row_to_entry(row, 12)?,
            read_position: row.get(20)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Look up the reading position for (user, chapter).
pub fn get_reading_progress(
    conn: &Connection,
    user_id: &str,
    chapter_id: &str,
) -> Result<Option<ReadingProgress>, OperationError> {
    conn.query_row(
        "SELECT user_id, chapter_id, percentage, completed, last_read_at
         FROM reading_progress WHERE user_id = ?1 AND chapter_id = ?2",
        params![user_id, chapter_id],
        |row| {
            Ok(ReadingProgress {
                user_id: row.get(0)?,
                chapter_id: row.get(1)?,
                percentage: row.get(2)?,
                completed: row.get(3)?,
                last_read_at: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

// ── Statistics ──────────────────────────────────────────────────────────────

/// Summary statistics for the store.
#[derive(Debug)]
pub struct StoreStats {
    pub titles: i64,
    pub never_checked: i64,
    pub source_links: i64,
    pub chapters: i64,
    pub library_entries: i64,
}

/// Get overall store statistics.
pub fn store_stats(conn: &Connection) -> Result<StoreStats, OperationError> {
    let titles: i64 = conn.query_row("SELECT COUNT(*) FROM titles", [], |r| r.get(0))?;
    let never_checked: i64 = conn.query_row(
        "SELECT COUNT(*) FROM titles WHERE last_checked_at IS NULL",
        [],
        |r| r.get(0),
    )?;
    let source_links: i64 = conn.query_row("SELECT COUNT(*) FROM source_links", [], |r| r.get(0))?;
    let chapters: i64 = conn.query_row("SELECT COUNT(*) FROM chapters", [], |r| r.get(0))?;
    let library_entries: i64 =
        conn.query_row("SELECT COUNT(*) FROM library_entries", [], |r| r.get(0))?;

    Ok(StoreStats {
        titles,
        never_checked,
        source_links,
        chapters,
        library_entries,
    })
}

// ── Row Mapping Helpers ─────────────────────────────────────────────────────

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn provider_at(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<Provider> {
    let name: String = row.get(column)?;
    name.parse().map_err(|e| conversion_error(column, e))
}

fn index_at(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<ChapterIndex> {
    let value: f64 = row.get(column)?;
    ChapterIndex::new(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Real, Box::new(e)))
}

fn json_list_at(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(column, e))
}

fn row_to_title(row: &rusqlite::Row<'_>) -> rusqlite::Result<Title> {
    let status_str: String = row.get(6)?;
    Ok(Title {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        description: row.get(4)?,
        cover_url: row.get(5)?,
        status: TitleStatus::from_str_loose(&status_str),
        genres: json_list_at(row, 7)?,
        chapters_count: row.get(8)?,
        last_checked_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceLink> {
    Ok(SourceLink {
        title_id: row.get(0)?,
        provider: provider_at(row, 1)?,
        provider_id: row.get(2)?,
        url: row.get(3)?,
        preferred: row.get(4)?,
        last_checked_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn row_to_chapter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get(0)?,
        title_id: row.get(1)?,
        provider: provider_at(row, 2)?,
        provider_chapter_id: row.get(3)?,
        index: index_at(row, 4)?,
        title: row.get(5)?,
        released_at: row.get(6)?,
        pages: json_list_at(row, 7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<LibraryEntry> {
    Ok(LibraryEntry {
        user_id: row.get(base)?,
        title_id: row.get(base + 1)?,
        favourite: row.get(base + 2)?,
        has_unseen: row.get(base + 3)?,
        last_read_chapter_id: row.get(base + 4)?,
        rating: row.get(base + 5)?,
        notes: row.get(base + 6)?,
        added_at: row.get(base + 7)?,
    })
}
