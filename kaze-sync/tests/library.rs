mod common;

use common::{seed, FakeConnector};
use kaze_catalog::{ChapterIndex, LibraryUpdate, Provider};
use kaze_db::open_memory;
use kaze_sync::library::{
    add_to_library, list_library, record_progress, remove_from_library, update_entry,
    update_last_read,
};
use kaze_sync::{AddOutcome, RemoveOutcome, SyncError, UpdateOutcome};

fn chapter_id(conn: &rusqlite::Connection, title_id: &str, index: f64) -> String {
    kaze_db::find_chapter(conn, title_id, ChapterIndex::new(index).unwrap())
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn add_and_remove_report_expected_states() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Pluto", &[1.0]).await;

    assert_eq!(add_to_library(&conn, "alice", &t.title_id).unwrap(), AddOutcome::Added);
    assert_eq!(
        add_to_library(&conn, "alice", &t.title_id).unwrap(),
        AddOutcome::AlreadyTracking
    );
    assert_eq!(add_to_library(&conn, "bob", &t.title_id).unwrap(), AddOutcome::Added);

    assert_eq!(
        remove_from_library(&conn, "alice", &t.title_id).unwrap(),
        RemoveOutcome::Removed
    );
    assert_eq!(
        remove_from_library(&conn, "alice", &t.title_id).unwrap(),
        RemoveOutcome::NotTracking
    );
    assert_eq!(list_library(&conn, "bob").unwrap().len(), 1);
}

#[test]
fn unknown_title_or_user_is_rejected() {
    let conn = open_memory().unwrap();
    assert!(matches!(
        add_to_library(&conn, "alice", "missing"),
        Err(SyncError::TitleNotFound(_))
    ));
    assert!(matches!(
        add_to_library(&conn, " ", "missing"),
        Err(SyncError::Validation(_))
    ));
}

#[tokio::test]
async fn progress_is_upserted_with_completion_threshold() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Pluto", &[1.0, 2.0]).await;
    let ch1 = chapter_id(&conn, &t.title_id, 1.0);

    let first = record_progress(&conn, "alice", &ch1, 40.0).unwrap();
    assert!(!first.completed);

    let second = record_progress(&conn, "alice", &ch1, 98.0).unwrap();
    assert!(second.completed);

    let stored = kaze_db::get_reading_progress(&conn, "alice", &ch1).unwrap().unwrap();
    assert_eq!(stored.percentage, 98.0);
    assert!(stored.completed);

    assert!(matches!(
        record_progress(&conn, "alice", &ch1, 100.5),
        Err(SyncError::Validation(_))
    ));
    assert!(matches!(
        record_progress(&conn, "alice", &ch1, f64::NAN),
        Err(SyncError::Validation(_))
    ));
    assert!(matches!(
        record_progress(&conn, "alice", "nope", 10.0),
        Err(SyncError::ChapterNotFound(_))
    ));
}

#[tokio::test]
async fn reading_latest_chapter_clears_unseen() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let registry = common::registry_with(&[md.clone()]);
    let t = seed(&conn, &md, "md-1", "Pluto", &[1.0]).await;
    add_to_library(&conn, "alice", &t.title_id).unwrap();

    md.set_chapters("md-1", &[1.0, 2.0]);
    kaze_sync::sync_title_by_slug(&conn, &registry, &t.slug).await.unwrap();
    let unseen = || {
        kaze_db::get_library_entry(&conn, "alice", &t.title_id)
            .unwrap()
            .unwrap()
            .has_unseen
    };
    assert!(unseen());

    record_progress(&conn, "alice", &chapter_id(&conn, &t.title_id, 1.0), 100.0).unwrap();
    assert!(unseen());

    record_progress(&conn, "alice", &chapter_id(&conn, &t.title_id, 2.0), 10.0).unwrap();
    assert!(!unseen());
}

#[tokio::test]
async fn list_derives_new_chapter_flag() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Pluto", &[1.0, 2.0, 3.0]).await;
    add_to_library(&conn, "alice", &t.title_id).unwrap();

    // Nothing read yet.
    let items = list_library(&conn, "alice").unwrap();
    assert_eq!(items[0].read_position, 0);
    assert!(items[0].has_new_chapter);

    record_progress(&conn, "alice", &chapter_id(&conn, &t.title_id, 2.0), 100.0).unwrap();
    let items = list_library(&conn, "alice").unwrap();
    assert_eq!(items[0].read_position, 2);
    assert!(items[0].has_new_chapter);

    record_progress(&conn, "alice", &chapter_id(&conn, &t.title_id, 3.0), 100.0).unwrap();
    assert!(!list_library(&conn, "alice").unwrap()[0].has_new_chapter);

    // Re-reading an earlier chapter moves the marker back.
    let ch1 = chapter_id(&conn, &t.title_id, 1.0);
    assert_eq!(
        update_last_read(&conn, "alice", &t.title_id, &ch1).unwrap(),
        UpdateOutcome::Updated
    );
    assert_eq!(list_library(&conn, "alice").unwrap()[0].read_position, 1);
}

#[tokio::test]
async fn last_read_requires_chapter_of_the_title() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let a = seed(&conn, &md, "md-a", "Pluto", &[1.0]).await;
    let b = seed(&conn, &md, "md-b", "Monster", &[1.0]).await;
    add_to_library(&conn, "alice", &a.title_id).unwrap();

    let foreign = chapter_id(&conn, &b.title_id, 1.0);
    assert!(matches!(
        update_last_read(&conn, "alice", &a.title_id, &foreign),
        Err(SyncError::ChapterNotFound(_))
    ));
    assert_eq!(
        update_last_read(&conn, "alice", &b.title_id, &foreign).unwrap(),
        UpdateOutcome::NotTracking
    );
}

#[tokio::test]
async fn entry_update_validates_rating() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    let t = seed(&conn, &md, "md-1", "Pluto", &[]).await;

    let update = LibraryUpdate {
        favourite: Some(true),
        rating: Some(Some(9)),
        notes: Some(Some("re-read".to_string())),
    };
    assert_eq!(
        update_entry(&conn, "alice", &t.title_id, &update).unwrap(),
        UpdateOutcome::NotTracking
    );

    add_to_library(&conn, "alice", &t.title_id).unwrap();
    assert_eq!(
        update_entry(&conn, "alice", &t.title_id, &update).unwrap(),
        UpdateOutcome::Updated
    );
    let entry = kaze_db::get_library_entry(&conn, "alice", &t.title_id).unwrap().unwrap();
    assert!(entry.favourite);
    assert_eq!(entry.rating, Some(9));
    assert_eq!(entry.notes.as_deref(), Some("re-read"));

    let bad = LibraryUpdate {
        rating: Some(Some(11)),
        ..LibraryUpdate::default()
    };
    assert!(matches!(
        update_entry(&conn, "alice", &t.title_id, &bad),
        Err(SyncError::Validation(_))
    ));
}

#[tokio::test]
async fn side_chapters_count_by_position_not_by_number() {
    let conn = open_memory().unwrap();
    let md = FakeConnector::new(Provider::MangaDex);
    // Four chapters, the highest numbered 11: comparing the count against
    // the chapter number would call 10.5 fully read.
    let t = seed(&conn, &md, "md-1", "Pluto", &[9.0, 10.0, 10.5, 11.0]).await;
    add_to_library(&conn, "alice", &t.title_id).unwrap();

    let side = chapter_id(&conn, &t.title_id, 10.5);
    update_last_read(&conn, "alice", &t.title_id, &side).unwrap();
    let item = &list_library(&conn, "alice").unwrap()[0];
    assert_eq!(item.title.chapters_count, 4);
    assert_eq!(item.read_position, 3);
    assert!(item.has_new_chapter);

    let last = chapter_id(&conn, &t.title_id, 11.0);
    update_last_read(&conn, "alice", &t.title_id, &last).unwrap();
    let item = &list_library(&conn, "alice").unwrap()[0];
    assert_eq!(item.read_position, 4);
    assert!(!item.has_new_chapter);
}
