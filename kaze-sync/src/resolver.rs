//! Resolve a provider's representation of a title to one canonical title.
//!
//! The exact (provider, provider id) link always wins. Without one, the
//! provider's metadata is fetched and matched against existing titles by
//! slug or display title, depending on the [`MatchPolicy`]. Anything
//! unmatched becomes a new title with a unique slug.
//!
//! Concurrent resolvers are reconciled by the store's unique constraints:
//! whoever loses an insert race re-reads what the winner wrote.

use kaze_catalog::{slug_with_suffix, slugify, NewSourceLink, NewTitle, Provider, Title};
use kaze_connector::{ConnectorRegistry, TitleMetadata};
use kaze_db::{operations, queries, OperationError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Insert attempts before a resolver gives up on a contended title.
const MAX_CONFLICT_RETRIES: usize = 3;

/// Highest numeric suffix tried when disambiguating a slug.
const MAX_SLUG_SUFFIX: u32 = 1000;

/// How a newly seen provider title may merge into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Merge on exact slug or case-insensitive exact title. Cheap, but two
    /// unrelated works sharing a generic name will be merged.
    #[default]
    SlugOrTitle,
    /// Only the exact provider link identifies a title; everything else is new.
    ProviderLinkOnly,
}

/// Result of resolving a provider title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub title_id: String,
    pub slug: String,
    pub is_new: bool,
}

impl Resolved {
    fn existing(title: &Title) -> Self {
        Self {
            title_id: title.id.clone(),
            slug: title.slug.clone(),
            is_new: false,
        }
    }
}

/// Resolve `provider_name`/`provider_id` to a canonical title, creating one
/// if needed.
///
/// `fallback_title` is used as the display title when the provider's
/// metadata has none.
pub async fn resolve(
    conn: &Connection,
    registry: &ConnectorRegistry,
    provider_name: &str,
    provider_id: &str,
    fallback_title: Option<&str>,
    policy: MatchPolicy,
) -> Result<Resolved, SyncError> {
    let provider_id = provider_id.trim();
    if provider_id.is_empty() {
        return Err(SyncError::Validation("missing provider id".to_string()));
    }
    let connector = registry.resolve(provider_name)?;
    let provider = connector.provider();

    if let Some(found) = resolve_by_link(conn, provider, provider_id)? {
        log::debug!("{provider}/{provider_id} already linked to '{}'", found.slug);
        return Ok(found);
    }

    let metadata = connector
        .fetch_title(provider_id)
        .await
        .map_err(|e| SyncError::FetchDetailsFailed {
            provider,
            provider_id: provider_id.to_string(),
            reason: e.to_string(),
        })?;

    let display_title = display_title(&metadata, fallback_title).ok_or_else(|| {
        SyncError::FetchDetailsFailed {
            provider,
            provider_id: provider_id.to_string(),
            reason: "provider returned no title".to_string(),
        }
    })?;

    let base_slug = slugify(&display_title);
    if base_slug.is_empty() {
        return Err(SyncError::Validation(format!(
            "title '{display_title}' does not produce a usable slug"
        )));
    }

    let link_for = |title_id: &str| NewSourceLink {
        title_id: title_id.to_string(),
        provider,
        provider_id: provider_id.to_string(),
        url: metadata.url.clone(),
    };

    let mut last_conflict = None;
    for attempt in 0..MAX_CONFLICT_RETRIES {
        if attempt > 0 {
            if let Some(found) = resolve_by_link(conn, provider, provider_id)? {
                return Ok(found);
            }
        }

        if policy == MatchPolicy::SlugOrTitle {
            if let Some(existing) = queries::find_title_match(conn, &base_slug, &display_title)? {
                match link_existing(conn, &existing, &link_for(&existing.id)) {
                    Ok(()) => {
                        log::info!(
                            "Linked {provider}/{provider_id} to existing title '{}'",
                            existing.slug
                        );
                        return Ok(Resolved::existing(&existing));
                    }
                    Err(OperationError::ProviderAlreadyLinked { .. }) => {
                        log::warn!(
                            "'{}' already has a different {provider} link; creating a separate title",
                            existing.slug
                        );
                    }
                    Err(e) if e.is_conflict() => {
                        last_conflict = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let slug = unique_slug(conn, &base_slug)?;
        let title = new_title(&slug, &display_title, &metadata);
        match operations::insert_title_with_link(
            conn,
            &title,
            &link_for(&title.id),
            &operations::now_timestamp(),
        ) {
            Ok(()) => {
                log::info!("Created title '{slug}' from {provider}/{provider_id}");
                return Ok(Resolved {
                    title_id: title.id,
                    slug,
                    is_new: true,
                });
            }
            Err(e) if e.is_conflict() => {
                log::debug!("Lost insert race for {provider}/{provider_id}: {e}");
                last_conflict = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(found) = resolve_by_link(conn, provider, provider_id)? {
        return Ok(found);
    }
    Err(last_conflict
        .map(SyncError::from)
        .unwrap_or_else(|| SyncError::Validation(format!("could not resolve {provider}/{provider_id}"))))
}

/// The title owning an exact (provider, id) link, if any.
fn resolve_by_link(
    conn: &Connection,
    provider: Provider,
    provider_id: &str,
) -> Result<Option<Resolved>, SyncError> {
    let Some(link) = queries::find_link(conn, provider, provider_id)? else {
        return Ok(None);
    };
    let title = queries::get_title(conn, &link.title_id)?
        .ok_or_else(|| SyncError::TitleNotFound(link.title_id.clone()))?;
    Ok(Some(Resolved::existing(&title)))
}

/// Attach a link to a matched title. The link is preferred only when the
/// title has no other link.
fn link_existing(
    conn: &Connection,
    title: &Title,
    link: &NewSourceLink,
) -> Result<(), OperationError> {
    let preferred = queries::links_for_title(conn, &title.id)?.is_empty();
    operations::insert_source_link(conn, link, preferred, &operations::now_timestamp())
}

/// First free slug among `base`, `base-2`, `base-3`, ...
fn unique_slug(conn: &Connection, base: &str) -> Result<String, SyncError> {
    if !queries::slug_exists(conn, base)? {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_SLUG_SUFFIX {
        let candidate = slug_with_suffix(base, n);
        if !queries::slug_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(SyncError::Validation(format!("no free slug for '{base}'")))
}

fn display_title(metadata: &TitleMetadata, fallback: Option<&str>) -> Option<String> {
    [Some(metadata.title.as_str()), fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn new_title(slug: &str, display_title: &str, metadata: &TitleMetadata) -> NewTitle {
    NewTitle {
        id: uuid::Uuid::new_v4().to_string(),
        slug: slug.to_string(),
        title: display_title.to_string(),
        author: metadata.author.clone(),
        description: metadata.description.clone(),
        cover_url: metadata.cover_url.clone(),
        status: metadata.status,
        genres: metadata.genres.clone(),
    }
}
