mod common;

use std::sync::atomic::Ordering;

use common::{registry_with, seed, FakeConnector};
use kaze_catalog::{ChapterIndex, Provider};
use kaze_db::open_memory;
use kaze_sync::{backfill_pages, SyncError};

#[tokio::test]
async fn pages_are_fetched_once_and_stored() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Akira", &[1.0, 1.5]).await;
    md.set_pages("md-1", 1.5, &["p1.png", "p2.png"]);
    let registry = registry_with(&[md.clone()]);

    let chapter = kaze_db::find_chapter(&conn, &t.title_id, ChapterIndex::new(1.5).unwrap())
        .unwrap()
        .unwrap();
    assert!(chapter.pages.is_empty());

    let pages = backfill_pages(&conn, &registry, &chapter.id).await.unwrap();
    assert_eq!(pages, vec!["p1.png", "p2.png"]);

    let again = backfill_pages(&conn, &registry, &chapter.id).await.unwrap();
    assert_eq!(again, pages);
    assert_eq!(md.page_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_page_list_is_not_stored() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Akira", &[1.0]).await;
    let registry = registry_with(&[md.clone()]);
    let chapter = kaze_db::find_chapter(&conn, &t.title_id, ChapterIndex::new(1.0).unwrap())
        .unwrap()
        .unwrap();

    assert!(backfill_pages(&conn, &registry, &chapter.id).await.unwrap().is_empty());
    backfill_pages(&conn, &registry, &chapter.id).await.unwrap();
    assert_eq!(md.page_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_chapter_and_provider_errors_surface() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Akira", &[1.0]).await;
    let registry = registry_with(&[md.clone()]);

    let err = backfill_pages(&conn, &registry, "nope").await.unwrap_err();
    assert!(matches!(err, SyncError::ChapterNotFound(_)));

    let chapter = kaze_db::find_chapter(&conn, &t.title_id, ChapterIndex::new(1.0).unwrap())
        .unwrap()
        .unwrap();
    md.fail("md-1", "gone");
    let err = backfill_pages(&conn, &registry, &chapter.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Provider(_)));
}
