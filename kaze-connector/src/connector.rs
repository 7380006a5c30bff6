use async_trait::async_trait;
use kaze_catalog::{ChapterIndex, Provider};

use crate::error::ProviderError;
use crate::types::{ChapterMetadata, PageRef, TitleMetadata};

/// A source of title metadata and chapters.
///
/// Implementations do not retry or cache; a failed call is reported as-is
/// and the caller decides what to do about it.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The provider this connector talks to.
    fn provider(&self) -> Provider;

    /// Fetch title metadata for a provider-local id.
    async fn fetch_title(&self, provider_id: &str) -> Result<TitleMetadata, ProviderError>;

    /// Fetch the chapter list, ordered by index.
    async fn fetch_chapter_list(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ChapterMetadata>, ProviderError>;

    /// Fetch the ordered page references of one chapter.
    async fn fetch_chapter_pages(
        &self,
        provider_id: &str,
        index: ChapterIndex,
    ) -> Result<Vec<PageRef>, ProviderError>;
}

/// Pick the chapter at `index` out of a listing.
pub(crate) fn chapter_at(
    chapters: Vec<ChapterMetadata>,
    provider_id: &str,
    index: ChapterIndex,
) -> Result<ChapterMetadata, ProviderError> {
    chapters
        .into_iter()
        .find(|c| c.index == index)
        .ok_or_else(|| ProviderError::NotFound(format!("{provider_id} chapter {index}")))
}

/// Drop chapters whose index repeats an earlier one, keeping the first.
///
/// Providers list one entry per scanlation group, so the same index often
/// appears more than once.
pub(crate) fn dedup_by_index(chapters: Vec<ChapterMetadata>) -> Vec<ChapterMetadata> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<ChapterMetadata> = chapters
        .into_iter()
        .filter(|c| seen.insert(c.index))
        .collect();
    out.sort_by_key(|c| c.index);
    out
}
