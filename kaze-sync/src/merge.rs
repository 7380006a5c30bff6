//! Chapter diff and merge.
//!
//! A sync runs in two halves so the batch scheduler can fetch in parallel
//! while keeping every store access on the thread that owns the connection:
//!
//! 1. [`fetch_updates`] talks to the provider only.
//! 2. [`apply_updates`] diffs the fetched chapters against the store and
//!    writes the result in one transaction.
//!
//! [`sync_title`] glues the two together for a single title.

use std::collections::HashSet;

use kaze_catalog::{ChapterIndex, NewChapter, Provider, Title, TitleRefresh, TitleStatus};
use kaze_connector::{ChapterMetadata, Connector, ConnectorRegistry, ProviderError, TitleMetadata};
use kaze_db::{operations, queries, OperationError};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::SyncError;

/// Result of one successful sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub added_count: usize,
    pub updated_metadata: bool,
}

/// Everything a provider said about one title, ready to be applied.
#[derive(Debug, Clone)]
pub struct FetchedUpdate {
    pub title_id: String,
    pub provider: Provider,
    pub provider_id: String,
    pub metadata: TitleMetadata,
    /// `None` when the reported chapter count matched the cached one and
    /// the chapter list was not fetched.
    pub chapters: Option<Vec<ChapterMetadata>>,
}

/// Fetch metadata and, unless the cheap count says nothing changed, the
/// full chapter list.
///
/// `cached_count` is `None` for a title that was never checked; its list
/// is always fetched.
pub async fn fetch_updates(
    connector: &dyn Connector,
    title_id: &str,
    provider_id: &str,
    cached_count: Option<u32>,
) -> Result<FetchedUpdate, ProviderError> {
    let metadata = connector.fetch_title(provider_id).await?;

    let unchanged = cached_count.is_some() && metadata.chapters_count == cached_count;
    let chapters = if unchanged {
        log::debug!(
            "{}/{provider_id}: chapter count unchanged at {}, skipping list",
            connector.provider(),
            metadata.chapters_count.unwrap_or_default()
        );
        None
    } else {
        Some(connector.fetch_chapter_list(provider_id).await?)
    };

    Ok(FetchedUpdate {
        title_id: title_id.to_string(),
        provider: connector.provider(),
        provider_id: provider_id.to_string(),
        metadata,
        chapters,
    })
}

/// Apply a fetched update: refresh metadata, insert unseen chapters, and
/// reset staleness, all or nothing.
///
/// A successful apply always stamps `last_checked_at`, even when nothing
/// was added.
pub fn apply_updates(
    conn: &Connection,
    update: &FetchedUpdate,
    now: &str,
) -> Result<SyncOutcome, OperationError> {
    let tx = conn.unchecked_transaction()?;

    let updated_metadata =
        operations::refresh_title_metadata(&tx, &update.title_id, &refresh_from(&update.metadata), now)?;

    let (added_count, reported_count) = match &update.chapters {
        Some(fetched) => {
            let known = queries::chapter_indices(&tx, &update.title_id)?;
            let fresh = new_chapters(&update.title_id, update.provider, &known, fetched);
            let added = if fresh.is_empty() {
                0
            } else {
                operations::insert_chapters(&tx, &fresh, now)?
            };
            if added < fresh.len() {
                log::debug!(
                    "'{}': {} chapters already inserted by a concurrent sync",
                    update.title_id,
                    fresh.len() - added
                );
            }
            let distinct = fetched.iter().map(|c| c.index).collect::<HashSet<_>>().len() as u32;
            (added, update.metadata.chapters_count.unwrap_or(distinct))
        }
        None => (0, update.metadata.chapters_count.unwrap_or_default()),
    };

    operations::mark_title_checked(&tx, &update.title_id, reported_count, now)?;
    operations::mark_link_checked(&tx, update.provider, &update.provider_id, now)?;
    if added_count > 0 {
        let flagged = operations::flag_unseen_for_title(&tx, &update.title_id)?;
        log::debug!("'{}': flagged {flagged} library entries", update.title_id);
    }

    tx.commit()?;
    Ok(SyncOutcome {
        added_count,
        updated_metadata,
    })
}

/// Sync one title against one of its provider links.
pub async fn sync_title(
    conn: &Connection,
    registry: &ConnectorRegistry,
    title_id: &str,
    provider_name: &str,
    provider_id: &str,
) -> Result<SyncOutcome, SyncError> {
    if provider_id.trim().is_empty() {
        return Err(SyncError::Validation("missing provider id".to_string()));
    }
    let connector = registry.resolve(provider_name)?;
    let title = queries::get_title(conn, title_id)?
        .ok_or_else(|| SyncError::TitleNotFound(title_id.to_string()))?;

    let update = fetch_updates(connector.as_ref(), &title.id, provider_id, cached_count(&title)).await?;
    let outcome = apply_updates(conn, &update, &operations::now_timestamp())?;

    log::info!(
        "Synced '{}' via {}: {} new chapters",
        title.slug,
        update.provider,
        outcome.added_count
    );
    Ok(outcome)
}

/// Sync a title through its preferred link.
pub async fn sync_title_by_slug(
    conn: &Connection,
    registry: &ConnectorRegistry,
    slug: &str,
) -> Result<SyncOutcome, SyncError> {
    let title = queries::get_title_by_slug(conn, slug)?
        .ok_or_else(|| SyncError::TitleNotFound(slug.to_string()))?;
    let link = queries::preferred_link(conn, &title.id)?
        .ok_or_else(|| SyncError::NoSourceLink(slug.to_string()))?;
    sync_title(conn, registry, &title.id, link.provider.as_str(), &link.provider_id).await
}

/// The chapter count a sync may trust, or `None` before the first check.
pub(crate) fn cached_count(title: &Title) -> Option<u32> {
    title.last_checked_at.as_ref().map(|_| title.chapters_count)
}

/// Metadata fields worth writing. Unknown status and an empty genre list
/// are treated as "not reported" so partial provider data never erases
/// what is stored.
fn refresh_from(metadata: &TitleMetadata) -> TitleRefresh {
    TitleRefresh {
        author: metadata.author.clone(),
        description: metadata.description.clone(),
        cover_url: metadata.cover_url.clone(),
        status: (metadata.status != TitleStatus::Unknown).then_some(metadata.status),
        genres: (!metadata.genres.is_empty()).then(|| metadata.genres.clone()),
    }
}

/// Provider chapters whose index is not stored yet.
///
/// Membership, not position: a provider may backfill an index lower than
/// the current maximum.
fn new_chapters(
    title_id: &str,
    provider: Provider,
    known: &HashSet<ChapterIndex>,
    fetched: &[ChapterMetadata],
) -> Vec<NewChapter> {
    let mut taken = HashSet::new();
    fetched
        .iter()
        .filter(|c| !known.contains(&c.index) && taken.insert(c.index))
        .map(|c| NewChapter {
            id: uuid::Uuid::new_v4().to_string(),
            title_id: title_id.to_string(),
            provider,
            provider_chapter_id: c.provider_chapter_id.clone(),
            index: c.index,
            title: c.title.clone(),
            released_at: c.released_at.clone(),
            pages: c.pages.clone(),
        })
        .collect()
}
