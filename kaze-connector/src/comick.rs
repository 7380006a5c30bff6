//! Comick connector (api.comick.io).
//!
//! Titles are addressed by their public slug; chapter endpoints need the
//! internal `hid`, which is looked up from the title first.

use async_trait::async_trait;
use kaze_catalog::{ChapterIndex, Provider, TitleStatus};
use serde::Deserialize;

use crate::client::{ApiClient, HttpConfig};
use crate::connector::{chapter_at, dedup_by_index, Connector};
use crate::error::ProviderError;
use crate::types::{ChapterMetadata, PageRef, TitleMetadata};

const BASE_URL: &str = "https://api.comick.io";
const SITE_URL: &str = "https://comick.io/comic";
const IMAGE_URL: &str = "https://meo.comick.pictures";
const CHAPTER_PAGE_SIZE: u32 = 300;
/// Upper bound on chapter pages walked for one title.
const MAX_CHAPTER_PAGES: u32 = 40;
const LANGUAGE: &str = "en";

pub struct ComickConnector {
    client: ApiClient,
}

impl ComickConnector {
    pub fn new(config: &HttpConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: ApiClient::new(Provider::Comick, BASE_URL, config)?,
        })
    }

    async fn comic(&self, slug: &str) -> Result<ComicResponse, ProviderError> {
        self.client.get_json(&format!("/comic/{slug}"), &[]).await
    }
}

// ── Response Types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ComicResponse {
    comic: Comic,
    #[serde(default)]
    authors: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct Comic {
    hid: String,
    slug: Option<String>,
    title: Option<String>,
    desc: Option<String>,
    status: Option<i64>,
    #[serde(default)]
    md_covers: Vec<Cover>,
    #[serde(default)]
    md_comic_md_genres: Vec<GenreLink>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Cover {
    b2key: String,
}

#[derive(Debug, Deserialize)]
struct GenreLink {
    md_genres: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct ChapterPage {
    #[serde(default)]
    chapters: Vec<ComickChapter>,
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ComickChapter {
    hid: String,
    chap: Option<String>,
    title: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterDetail {
    chapter: ChapterImages,
}

#[derive(Debug, Deserialize)]
struct ChapterImages {
    #[serde(default)]
    md_images: Vec<Cover>,
}

// ── Mapping ─────────────────────────────────────────────────────────────────

fn map_status(code: Option<i64>) -> TitleStatus {
    match code {
        Some(1) => TitleStatus::Ongoing,
        Some(2) => TitleStatus::Completed,
        Some(3) => TitleStatus::Cancelled,
        Some(4) => TitleStatus::Hiatus,
        _ => TitleStatus::Unknown,
    }
}

fn map_title(response: ComicResponse, requested_slug: &str) -> TitleMetadata {
    let comic = response.comic;
    let slug = comic.slug.unwrap_or_else(|| requested_slug.to_string());
    TitleMetadata {
        title: comic.title.map(|t| t.trim().to_string()).unwrap_or_default(),
        author: response.authors.into_iter().next().map(|a| a.name),
        description: comic.desc.filter(|d| !d.trim().is_empty()),
        cover_url: comic
            .md_covers
            .first()
            .map(|c| format!("{IMAGE_URL}/{}", c.b2key)),
        status: map_status(comic.status),
        genres: comic
            .md_comic_md_genres
            .into_iter()
            .filter_map(|g| g.md_genres.map(|n| n.name))
            .collect(),
        url: Some(format!("{SITE_URL}/{slug}")),
        chapters_count: None,
    }
}

fn map_chapter(chapter: ComickChapter) -> Option<ChapterMetadata> {
    let raw = chapter.chap.as_deref()?;
    match raw.parse::<ChapterIndex>() {
        Ok(index) => Some(ChapterMetadata {
            provider_chapter_id: chapter.hid,
            index,
            title: chapter.title.filter(|t| !t.trim().is_empty()),
            released_at: chapter.created_at,
            pages: Vec::new(),
        }),
        Err(e) => {
            log::warn!("Skipping Comick chapter {}: {e}", chapter.hid);
            None
        }
    }
}

// ── Connector ───────────────────────────────────────────────────────────────

#[async_trait]
impl Connector for ComickConnector {
    fn provider(&self) -> Provider {
        Provider::Comick
    }

    async fn fetch_title(&self, provider_id: &str) -> Result<TitleMetadata, ProviderError> {
        let response = self.comic(provider_id).await?;
        Ok(map_title(response, provider_id))
    }

    async fn fetch_chapter_list(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ChapterMetadata>, ProviderError> {
        let hid = self.comic(provider_id).await?.comic.hid;
        let mut chapters = Vec::new();
        let mut seen_rows = 0;

        for page in 1..=MAX_CHAPTER_PAGES {
            let batch: ChapterPage = self
                .client
                .get_json(
                    &format!("/comic/{hid}/chapters"),
                    &[
                        ("lang", LANGUAGE.to_string()),
                        ("limit", CHAPTER_PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let fetched = batch.chapters.len() as u32;
            seen_rows += fetched;
            chapters.extend(batch.chapters.into_iter().filter_map(map_chapter));
            if fetched < CHAPTER_PAGE_SIZE || batch.total.is_some_and(|t| seen_rows >= t) {
                break;
            }
        }

        Ok(dedup_by_index(chapters))
    }

    async fn fetch_chapter_pages(
        &self,
        provider_id: &str,
        index: ChapterIndex,
    ) -> Result<Vec<PageRef>, ProviderError> {
        let chapter = chapter_at(self.fetch_chapter_list(provider_id).await?, provider_id, index)?;
        let detail: ChapterDetail = self
            .client
            .get_json(&format!("/chapter/{}", chapter.provider_chapter_id), &[])
            .await?;

        Ok(detail
            .chapter
            .md_images
            .into_iter()
            .map(|img| format!("{IMAGE_URL}/{}", img.b2key))
            .collect())
    }
}
