//! MangaDex connector (api.mangadex.org).

use std::collections::HashMap;

use async_trait::async_trait;
use kaze_catalog::{ChapterIndex, Provider, TitleStatus};
use serde::Deserialize;

use crate::client::{ApiClient, HttpConfig};
use crate::connector::{chapter_at, dedup_by_index, Connector};
use crate::error::ProviderError;
use crate::types::{ChapterMetadata, PageRef, TitleMetadata};

const BASE_URL: &str = "https://api.mangadex.org";
const SITE_URL: &str = "https://mangadex.org/title";
const COVER_URL: &str = "https://uploads.mangadex.org/covers";
const FEED_PAGE_SIZE: u32 = 500;
/// Upper bound on feed pages walked for one title.
const MAX_FEED_PAGES: u32 = 40;
const LANGUAGE: &str = "en";

pub struct MangaDexConnector {
    client: ApiClient,
}

impl MangaDexConnector {
    pub fn new(config: &HttpConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: ApiClient::new(Provider::MangaDex, BASE_URL, config)?,
        })
    }
}

// ── Response Types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(default)]
    description: HashMap<String, String>,
    status: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    data: Vec<FeedChapter>,
    total: u32,
}

#[derive(Debug, Deserialize)]
struct FeedChapter {
    id: String,
    attributes: FeedAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedAttributes {
    chapter: Option<String>,
    title: Option<String>,
    publish_at: Option<String>,
    external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtHome {
    #[serde(rename = "baseUrl")]
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
}

// ── Mapping ─────────────────────────────────────────────────────────────────

/// English text if present, otherwise any non-empty localisation.
fn localized(map: &HashMap<String, String>) -> Option<String> {
    map.get(LANGUAGE)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| map.values().find(|s| !s.trim().is_empty()))
        .map(|s| s.trim().to_string())
}

/// Title metadata without a cheap chapter count.
///
/// The `/aggregate` endpoint lists external-only chapters, which the feed
/// drops, so its count cannot be compared with what a sync stores. Leaving
/// the count unknown makes every sync walk the feed.
fn map_title(manga: MangaData) -> TitleMetadata {
    let attr_str = |rel: &Relationship, key: &str| {
        rel.attributes
            .as_ref()
            .and_then(|a| a.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    let author = manga
        .relationships
        .iter()
        .find(|r| r.rel_type == "author")
        .and_then(|r| attr_str(r, "name"));
    let cover_url = manga
        .relationships
        .iter()
        .find(|r| r.rel_type == "cover_art")
        .and_then(|r| attr_str(r, "fileName"))
        .map(|file| format!("{COVER_URL}/{}/{file}", manga.id));

    let genres = manga
        .attributes
        .tags
        .iter()
        .filter_map(|t| localized(&t.attributes.name))
        .collect();

    TitleMetadata {
        title: localized(&manga.attributes.title).unwrap_or_default(),
        author,
        description: localized(&manga.attributes.description),
        cover_url,
        status: manga
            .attributes
            .status
            .as_deref()
            .map(TitleStatus::from_str_loose)
            .unwrap_or(TitleStatus::Unknown),
        genres,
        url: Some(format!("{SITE_URL}/{}", manga.id)),
        chapters_count: None,
    }
}

fn map_feed_chapter(chapter: FeedChapter) -> Option<ChapterMetadata> {
    if chapter.attributes.external_url.is_some() {
        return None;
    }
    let raw = chapter.attributes.chapter.as_deref().unwrap_or("0");
    let index = match raw.parse::<ChapterIndex>() {
        Ok(index) => index,
        Err(e) => {
            log::warn!("Skipping MangaDex chapter {}: {e}", chapter.id);
            return None;
        }
    };
    Some(ChapterMetadata {
        provider_chapter_id: chapter.id,
        index,
        title: chapter.attributes.title.filter(|t| !t.trim().is_empty()),
        released_at: chapter.attributes.publish_at,
        pages: Vec::new(),
    })
}

// ── Connector ───────────────────────────────────────────────────────────────

#[async_trait]
impl Connector for MangaDexConnector {
    fn provider(&self) -> Provider {
        Provider::MangaDex
    }

    async fn fetch_title(&self, provider_id: &str) -> Result<TitleMetadata, ProviderError> {
        let manga: Envelope<MangaData> = self
            .client
            .get_json(
                &format!("/manga/{provider_id}"),
                &[
                    ("includes[]", "cover_art".to_string()),
                    ("includes[]", "author".to_string()),
                ],
            )
            .await?;

        Ok(map_title(manga.data))
    }

    async fn fetch_chapter_list(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ChapterMetadata>, ProviderError> {
        let mut chapters = Vec::new();
        let mut offset = 0;

        for _ in 0..MAX_FEED_PAGES {
            let page: FeedPage = self
                .client
                .get_json(
                    &format!("/manga/{provider_id}/feed"),
                    &[
                        ("translatedLanguage[]", LANGUAGE.to_string()),
                        ("order[chapter]", "asc".to_string()),
                        ("limit", FEED_PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let fetched = page.data.len() as u32;
            chapters.extend(page.data.into_iter().filter_map(map_feed_chapter));
            offset += fetched;
            if fetched == 0 || offset >= page.total {
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
        let at_home: AtHome = self
            .client
            .get_json(
                &format!("/at-home/server/{}", chapter.provider_chapter_id),
                &[],
            )
            .await?;

        Ok(at_home
            .chapter
            .data
            .iter()
            .map(|file| format!("{}/data/{}/{file}", at_home.base_url, at_home.chapter.hash))
            .collect())
    }
}
