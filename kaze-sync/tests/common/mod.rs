#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kaze_catalog::{ChapterIndex, Provider, TitleStatus};
use kaze_connector::{
    ChapterMetadata, Connector, ConnectorRegistry, PageRef, ProviderError, TitleMetadata,
};

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Script {
    titles: HashMap<String, TitleMetadata>,
    chapters: HashMap<String, Vec<ChapterMetadata>>,
    pages: HashMap<String, Vec<PageRef>>,
    failing: HashMap<String, String>,
}

/// Scriptable in-memory connector.
pub struct FakeConnector {
    provider: Provider,
    script: Mutex<Script>,
    before_fetch: Mutex<Option<Hook>>,
    pub title_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
}

impl FakeConnector {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            script: Mutex::new(Script::default()),
            before_fetch: Mutex::new(None),
            title_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        })
    }

    /// Serve `title` for `id`, with `count` as the cheap chapter count.
    pub fn set_title(&self, id: &str, title: &str, count: Option<u32>) {
        self.script.lock().unwrap().titles.insert(
            id.to_string(),
            TitleMetadata {
                title: title.to_string(),
                author: Some("Author".to_string()),
                description: None,
                cover_url: None,
                status: TitleStatus::Ongoing,
                genres: vec!["Action".to_string()],
                url: Some(format!("https://example.test/{id}")),
                chapters_count: count,
            },
        );
    }

    pub fn set_chapters(&self, id: &str, indices: &[f64]) {
        let chapters = indices
            .iter()
            .map(|&i| ChapterMetadata {
                provider_chapter_id: format!("{id}-{i}"),
                index: ChapterIndex::new(i).unwrap(),
                title: None,
                released_at: None,
                pages: vec![],
            })
            .collect();
        self.script.lock().unwrap().chapters.insert(id.to_string(), chapters);
    }

    pub fn set_pages(&self, id: &str, index: f64, pages: &[&str]) {
        self.script.lock().unwrap().pages.insert(
            format!("{id}@{index}"),
            pages.iter().map(|p| p.to_string()).collect(),
        );
    }

    /// Make every fetch for `id` fail with a server error.
    pub fn fail(&self, id: &str, message: &str) {
        self.script
            .lock()
            .unwrap()
            .failing
            .insert(id.to_string(), message.to_string());
    }

    /// Run `hook` with the provider id at the start of every title fetch.
    pub fn before_fetch(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.before_fetch.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.title_calls.load(Ordering::SeqCst),
            self.list_calls.load(Ordering::SeqCst),
        )
    }

    fn check_failure(&self, id: &str) -> Result<(), ProviderError> {
        match self.script.lock().unwrap().failing.get(id) {
            Some(message) => Err(ProviderError::ServerError {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_title(&self, provider_id: &str) -> Result<TitleMetadata, ProviderError> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.before_fetch.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(provider_id);
        }
        self.check_failure(provider_id)?;
        self.script
            .lock()
            .unwrap()
            .titles
            .get(provider_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(provider_id.to_string()))
    }

    async fn fetch_chapter_list(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ChapterMetadata>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(provider_id)?;
        Ok(self
            .script
            .lock()
            .unwrap()
            .chapters
            .get(provider_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_chapter_pages(
        &self,
        provider_id: &str,
        index: ChapterIndex,
    ) -> Result<Vec<PageRef>, ProviderError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(provider_id)?;
        Ok(self
            .script
            .lock()
            .unwrap()
            .pages
            .get(&format!("{provider_id}@{index}"))
            .cloned()
            .unwrap_or_default())
    }
}

pub fn registry_with(connectors: &[Arc<FakeConnector>]) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    for connector in connectors {
        registry.register(connector.clone());
    }
    registry
}

/// Import `title` from `fake` and sync it so it has chapters at `indices`.
pub async fn seed(
    conn: &rusqlite::Connection,
    fake: &Arc<FakeConnector>,
    id: &str,
    title: &str,
    indices: &[f64],
) -> kaze_sync::Resolved {
    fake.set_title(id, title, None);
    fake.set_chapters(id, indices);
    let registry = registry_with(&[fake.clone()]);
    let resolved = kaze_sync::resolve(
        conn,
        &registry,
        fake.provider.as_str(),
        id,
        None,
        kaze_sync::MatchPolicy::ProviderLinkOnly,
    )
    .await
    .unwrap();
    kaze_sync::sync_title(conn, &registry, &resolved.title_id, fake.provider.as_str(), id)
        .await
        .unwrap();
    resolved
}
