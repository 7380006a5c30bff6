//! On-demand page backfill.
//!
//! Chapter listings rarely carry page references, so they are fetched the
//! first time someone asks for a chapter and stored for later.

use kaze_connector::{ConnectorRegistry, PageRef};
use kaze_db::{operations, queries};
use rusqlite::Connection;

use crate::error::SyncError;

/// Page references of a chapter, fetching and storing them if missing.
pub async fn backfill_pages(
    conn: &Connection,
    registry: &ConnectorRegistry,
    chapter_id: &str,
) -> Result<Vec<PageRef>, SyncError> {
    let chapter = queries::get_chapter(conn, chapter_id)?
        .ok_or_else(|| SyncError::ChapterNotFound(chapter_id.to_string()))?;
    if !chapter.pages.is_empty() {
        return Ok(chapter.pages);
    }

    // The chapter came from one provider; only that provider's link knows
    // its index.
    let link = queries::links_for_title(conn, &chapter.title_id)?
        .into_iter()
        .find(|l| l.provider == chapter.provider)
        .ok_or_else(|| SyncError::NoSourceLink(chapter.title_id.clone()))?;
    let connector = registry.get(link.provider)?;

    let pages = connector
        .fetch_chapter_pages(&link.provider_id, chapter.index)
        .await?;
    if pages.is_empty() {
        log::warn!(
            "{}/{} chapter {} returned no pages",
            link.provider,
            link.provider_id,
            chapter.index
        );
        return Ok(pages);
    }

    if operations::backfill_chapter_pages(conn, &chapter.id, &pages)? {
        log::debug!("Stored {} pages for chapter {}", pages.len(), chapter.id);
        Ok(pages)
    } else {
        // Someone else stored them first; theirs win.
        let stored = queries::get_chapter(conn, &chapter.id)?
            .ok_or_else(|| SyncError::ChapterNotFound(chapter.id.clone()))?;
        Ok(stored.pages)
    }
}
