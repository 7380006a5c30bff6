//! Provider-neutral shapes returned by connectors.

use kaze_catalog::{ChapterIndex, TitleStatus};

/// A reference to one page image, usually an absolute URL.
pub type PageRef = String;

/// Title metadata as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleMetadata {
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: TitleStatus,
    pub genres: Vec<String>,
    /// Canonical page for the title on the provider's site.
    pub url: Option<String>,
    /// Chapter count from a cheap endpoint, when the provider offers one.
    /// `None` means the caller has to fetch the full list to know.
    pub chapters_count: Option<u32>,
}

/// One chapter as listed by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMetadata {
    pub provider_chapter_id: String,
    pub index: ChapterIndex,
    pub title: Option<String>,
    pub released_at: Option<String>,
    /// Often empty in listings; filled on demand via `fetch_chapter_pages`.
    pub pages: Vec<PageRef>,
}
