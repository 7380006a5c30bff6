//! Batch sync of the stalest titles.
//!
//! The database connection is `!Sync` and provider calls are slow, so the
//! run is split into three phases:
//!
//! 1. **Phase 1 (DB Read):** pick the stalest titles and their preferred links
//! 2. **Phase 2 (Fetch):** call providers from a bounded pool of tokio tasks
//! 3. **Phase 3 (DB Write):** apply each result on this thread as it arrives
//!
//! Every title is fetched at most once per run, so per-title writes never
//! overlap. A title whose fetch fails or is skipped gets no store write and
//! stays stale for the next run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use kaze_catalog::Provider;
use kaze_connector::{Connector, ConnectorRegistry};
use kaze_db::{operations, queries};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::SyncError;
use crate::merge::{self, FetchedUpdate};
use crate::progress::BatchProgress;

pub const DEFAULT_BATCH_LIMIT: u32 = 10;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const MAX_WORKERS: usize = 8;

/// Per-title fetch timeout, covering the title and chapter-list calls together.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(60);

/// Consecutive provider failures after which the rest of the batch is skipped.
pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 10;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub limit: u32,
    pub max_workers: usize,
    pub item_timeout: Duration,
    /// Set from outside to stop fetching. Titles not yet fetched are skipped.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BATCH_LIMIT,
            max_workers: DEFAULT_MAX_WORKERS,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            cancel: None,
        }
    }
}

/// A failure recorded against one title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleError {
    pub title_id: String,
    pub error: String,
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Titles attempted, failures included. Skipped titles are not counted.
    pub titles_checked: usize,
    /// Titles that gained at least one chapter.
    pub titles_updated: usize,
    pub chapters_added: usize,
    /// Titles left untouched by cancellation or the circuit breaker.
    pub titles_skipped: usize,
    pub per_title_errors: Vec<TitleError>,
}

impl BatchSummary {
    fn record_error(&mut self, title_id: &str, error: impl ToString) {
        self.titles_checked += 1;
        self.per_title_errors.push(TitleError {
            title_id: title_id.to_string(),
            error: error.to_string(),
        });
    }
}

// ── Three-Phase Batch Types ─────────────────────────────────────────────────

/// Pre-fetched work item for the fetch pool.
struct SyncWorkItem {
    title_id: String,
    slug: String,
    provider: Provider,
    provider_id: String,
    cached_count: Option<u32>,
    connector: Arc<dyn Connector>,
}

/// Outcome of one provider fetch (Phase 2 result).
enum FetchOutcome {
    Fetched {
        slug: String,
        update: FetchedUpdate,
    },
    /// Cancelled before the fetch started.
    Skipped { slug: String },
    Error {
        title_id: String,
        slug: String,
        error: String,
    },
}

/// Sync up to `options.limit` of the stalest titles.
///
/// Per-title problems (provider errors, timeouts, missing links) are
/// recorded in the summary and never abort the run. Only a failing store
/// makes the whole call fail.
pub async fn run_batch(
    conn: &Connection,
    registry: &ConnectorRegistry,
    options: &BatchOptions,
    progress: &dyn BatchProgress,
) -> Result<BatchSummary, SyncError> {
    let mut summary = BatchSummary::default();

    // ── Phase 1: DB Read: stalest titles + preferred links ────────
    let titles = queries::stale_titles(conn, options.limit)?;
    if titles.is_empty() {
        progress.on_complete("No titles to check");
        return Ok(summary);
    }

    let total = titles.len();
    let mut work_items = Vec::with_capacity(total);
    for title in titles {
        let Some(link) = queries::preferred_link(conn, &title.id)? else {
            log::warn!("'{}' has no source link, skipping", title.slug);
            summary.record_error(&title.id, SyncError::NoSourceLink(title.slug.clone()));
            continue;
        };
        let connector = match registry.get(link.provider) {
            Ok(connector) => connector,
            Err(e) => {
                log::warn!("'{}': {e}", title.slug);
                summary.record_error(&title.id, e);
                continue;
            }
        };
        let cached_count = merge::cached_count(&title);
        work_items.push(SyncWorkItem {
            title_id: title.id,
            slug: title.slug,
            provider: link.provider,
            provider_id: link.provider_id,
            cached_count,
            connector,
        });
    }

    let max_workers = options.max_workers.clamp(1, MAX_WORKERS);
    let mut current = total - work_items.len();
    progress.on_phase(&format!(
        "Checking {} titles ({} workers)",
        work_items.len(),
        max_workers
    ));

    // ── Phase 2+3: Parallel fetches with inline DB writes ──────────
    let cancel = options
        .cancel
        .clone()
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
    let breaker = Arc::new(AtomicBool::new(false));
    let item_timeout = options.item_timeout;

    let pool_cancel = cancel.clone();
    let pool_breaker = breaker.clone();
    let mut stream = stream::iter(work_items)
        .map(move |item| {
            let cancel = pool_cancel.clone();
            let breaker = pool_breaker.clone();
            let title_id = item.title_id.clone();
            let slug = item.slug.clone();
            // Spawned so the fetch progresses while this thread is writing.
            let handle = tokio::spawn(async move {
                if cancel.load(Ordering::Relaxed) || breaker.load(Ordering::Relaxed) {
                    return FetchOutcome::Skipped { slug: item.slug };
                }
                let fetch = merge::fetch_updates(
                    item.connector.as_ref(),
                    &item.title_id,
                    &item.provider_id,
                    item.cached_count,
                );
                match tokio::time::timeout(item_timeout, fetch).await {
                    Ok(Ok(update)) => FetchOutcome::Fetched {
                        slug: item.slug,
                        update,
                    },
                    Ok(Err(e)) => FetchOutcome::Error {
                        title_id: item.title_id,
                        slug: item.slug,
                        error: format!("{}: {e}", item.provider),
                    },
                    Err(_) => FetchOutcome::Error {
                        title_id: item.title_id,
                        slug: item.slug,
                        error: format!(
                            "{}: fetch timed out after {}s",
                            item.provider,
                            item_timeout.as_secs()
                        ),
                    },
                }
            });
            async move {
                handle.await.unwrap_or_else(|join_err| FetchOutcome::Error {
                    title_id,
                    slug,
                    error: format!("sync task failed: {join_err}"),
                })
            }
        })
        .buffer_unordered(max_workers);

    let mut consecutive_errors: u32 = 0;

    while let Some(outcome) = stream.next().await {
        current += 1;
        match outcome {
            FetchOutcome::Fetched { slug, update } => {
                consecutive_errors = 0;
                match merge::apply_updates(conn, &update, &operations::now_timestamp()) {
                    Ok(outcome) => {
                        summary.titles_checked += 1;
                        if outcome.added_count > 0 {
                            summary.titles_updated += 1;
                            summary.chapters_added += outcome.added_count;
                        }
                        progress.on_title(
                            current,
                            total,
                            &slug,
                            &format!("{} new chapters", outcome.added_count),
                        );
                    }
                    Err(e) => {
                        let e = SyncError::from(e);
                        if e.is_store_failure() {
                            return Err(e);
                        }
                        log::warn!("Could not apply update for '{slug}': {e}");
                        progress.on_title(current, total, &slug, "failed");
                        summary.record_error(&update.title_id, e);
                    }
                }
            }
            FetchOutcome::Skipped { slug } => {
                // No store write: the title stays stale and is retried next run.
                summary.titles_skipped += 1;
                progress.on_title(current, total, &slug, "skipped");
            }
            FetchOutcome::Error {
                title_id,
                slug,
                error,
            } => {
                consecutive_errors += 1;
                log::warn!("Sync failed for '{slug}': {error}");
                progress.on_title(current, total, &slug, "failed");
                summary.record_error(&title_id, error);

                if consecutive_errors >= CIRCUIT_BREAKER_THRESHOLD
                    && !breaker.swap(true, Ordering::Relaxed)
                {
                    log::warn!(
                        "Circuit breaker: {consecutive_errors} consecutive errors, skipping the rest of the batch"
                    );
                }
            }
        }
    }

    progress.on_complete(&format!(
        "Checked {} titles: {} updated, {} new chapters, {} failed, {} skipped",
        summary.titles_checked,
        summary.titles_updated,
        summary.chapters_added,
        summary.per_title_errors.len(),
        summary.titles_skipped,
    ));
    Ok(summary)
}
