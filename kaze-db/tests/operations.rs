use kaze_catalog::*;
use kaze_db::*;
use rusqlite::Connection;

const T0: &str = "2024-01-01T00:00:00.000Z";
const T1: &str = "2024-01-02T00:00:00.000Z";

fn new_title(id: &str, slug: &str, title: &str) -> NewTitle {
    NewTitle {
        id: id.to_string(),
        slug: slug.to_string(),
        title: title.to_string(),
        author: Some("Eiichiro Oda".to_string()),
        description: None,
        cover_url: None,
        status: TitleStatus::Ongoing,
        genres: vec!["Action".to_string(), "Adventure".to_string()],
    }
}

fn link(title_id: &str, provider: Provider, provider_id: &str) -> NewSourceLink {
    NewSourceLink {
        title_id: title_id.to_string(),
        provider,
        provider_id: provider_id.to_string(),
        url: None,
    }
}

fn chapter(title_id: &str, id: &str, index: f64) -> NewChapter {
    NewChapter {
        id: id.to_string(),
        title_id: title_id.to_string(),
        provider: Provider::MangaDex,
        provider_chapter_id: format!("md-{id}"),
        index: ChapterIndex::new(index).unwrap(),
        title: None,
        released_at: None,
        pages: vec![],
    }
}

fn seeded() -> Connection {
    let conn = open_memory().unwrap();
    insert_title_with_link(
        &conn,
        &new_title("t1", "one-piece", "One Piece"),
        &link("t1", Provider::MangaDex, "md-1"),
        T0,
    )
    .unwrap();
    conn
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

// ── Titles and links ────────────────────────────────────────────────────────

#[test]
fn insert_title_with_link_writes_both_rows() {
    let conn = seeded();

    let title = get_title(&conn, "t1").unwrap().unwrap();
    assert_eq!(title.slug, "one-piece");
    assert_eq!(title.genres, vec!["Action", "Adventure"]);
    assert_eq!(title.chapters_count, 0);
    assert!(title.last_checked_at.is_none());

    let links = links_for_title(&conn, "t1").unwrap();
    assert_eq!(links.len(), 1);
    assert!(links[0].preferred);
    assert_eq!(links[0].provider, Provider::MangaDex);
}

#[test]
fn duplicate_slug_is_classified_and_rolls_back() {
    let conn = seeded();
    let err = insert_title_with_link(
        &conn,
        &new_title("t2", "one-piece", "One Piece"),
        &link("t2", Provider::Comick, "ck-1"),
        T0,
    )
    .unwrap_err();

    assert!(matches!(err, OperationError::DuplicateSlug(ref s) if s == "one-piece"));
    assert!(err.is_conflict());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM titles"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM source_links"), 1);
}

#[test]
fn duplicate_link_rolls_back_the_title() {
    let conn = seeded();
    let err = insert_title_with_link(
        &conn,
        &new_title("t2", "one-piece-2", "One Piece"),
        &link("t2", Provider::MangaDex, "md-1"),
        T0,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        OperationError::DuplicateSourceLink { provider: Provider::MangaDex, ref provider_id } if provider_id == "md-1"
    ));
    assert!(get_title(&conn, "t2").unwrap().is_none());
}

#[test]
fn second_link_from_same_provider_is_rejected() {
    let conn = seeded();
    let err = insert_source_link(&conn, &link("t1", Provider::MangaDex, "md-other"), false, T0)
        .unwrap_err();
    assert!(matches!(err, OperationError::ProviderAlreadyLinked { .. }));
}

#[test]
fn set_preferred_link_switches_atomically() {
    let conn = seeded();
    insert_source_link(&conn, &link("t1", Provider::Comick, "ck-1"), false, T1).unwrap();

    set_preferred_link(&conn, "t1", Provider::Comick).unwrap();

    let links = links_for_title(&conn, "t1").unwrap();
    let preferred: Vec<_> = links.iter().filter(|l| l.preferred).collect();
    assert_eq!(preferred.len(), 1);
    assert_eq!(preferred[0].provider, Provider::Comick);
    assert_eq!(preferred_link(&conn, "t1").unwrap().unwrap().provider, Provider::Comick);
}

#[test]
fn set_preferred_link_unknown_provider_is_not_found() {
    let conn = seeded();
    let err = set_preferred_link(&conn, "t1", Provider::Comick).unwrap_err();
    assert!(matches!(err, OperationError::NotFound { .. }));
    assert!(preferred_link(&conn, "t1").unwrap().unwrap().preferred);
}

#[test]
fn refresh_metadata_reports_changes_only() {
    let conn = seeded();
    let refresh = TitleRefresh {
        description: Some("Pirates.".to_string()),
        status: Some(TitleStatus::Completed),
        ..Default::default()
    };
    assert!(refresh_title_metadata(&conn, "t1", &refresh, T1).unwrap());
    assert!(!refresh_title_metadata(&conn, "t1", &refresh, T1).unwrap());

    let title = get_title(&conn, "t1").unwrap().unwrap();
    assert_eq!(title.description.as_deref(), Some("Pirates."));
    assert_eq!(title.status, TitleStatus::Completed);
    assert_eq!(title.author.as_deref(), Some("Eiichiro Oda"));
}

#[test]
fn mark_title_checked_sets_count_and_timestamp() {
    let conn = seeded();
    mark_title_checked(&conn, "t1", 42, T1).unwrap();
    let title = get_title(&conn, "t1").unwrap().unwrap();
    assert_eq!(title.chapters_count, 42);
    assert_eq!(title.last_checked_at.as_deref(), Some(T1));
}

#[test]
fn mark_missing_title_checked_is_not_found() {
    let conn = open_memory().unwrap();
    let err = mark_title_checked(&conn, "nope", 1, T1).unwrap_err();
    assert!(matches!(err, OperationError::NotFound { .. }));
}

#[test]
fn timestamps_sort_lexically() {
    let a = now_timestamp();
    let b = now_timestamp();
    assert_eq!(a.len(), T0.len());
    assert!(a <= b);
    assert!(a.ends_with('Z'));
}

// ── Chapters ────────────────────────────────────────────────────────────────

#[test]
fn insert_chapters_skips_existing_indices() {
    let conn = seeded();
    let first = insert_chapters(&conn, &[chapter("t1", "c0", 0.0), chapter("t1", "c1", 1.0)], T0)
        .unwrap();
    assert_eq!(first, 2);

    let second = insert_chapters(
        &conn,
        &[chapter("t1", "c1b", 1.0), chapter("t1", "c2", 2.0)],
        T1,
    )
    .unwrap();
    assert_eq!(second, 1);
    assert_eq!(count_chapters(&conn, "t1").unwrap(), 3);
    // the original row wins the index
    assert_eq!(
        find_chapter(&conn, "t1", ChapterIndex::new(1.0).unwrap())
            .unwrap()
            .unwrap()
            .id,
        "c1"
    );
}

#[test]
fn backfill_only_fills_empty_page_lists() {
    let conn = seeded();
    insert_chapters(&conn, &[chapter("t1", "c0", 0.0)], T0).unwrap();

    let pages = vec!["p1.jpg".to_string(), "p2.jpg".to_string()];
    assert!(backfill_chapter_pages(&conn, "c0", &pages).unwrap());
    assert!(!backfill_chapter_pages(&conn, "c0", &["other.jpg".to_string()]).unwrap());
    assert_eq!(get_chapter(&conn, "c0").unwrap().unwrap().pages, pages);
}

#[test]
fn chapters_cascade_with_title() {
    let conn = seeded();
    insert_chapters(&conn, &[chapter("t1", "c0", 0.0)], T0).unwrap();
    conn.execute("DELETE FROM titles WHERE id = 't1'", []).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM chapters"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM source_links"), 0);
}

// ── Library ─────────────────────────────────────────────────────────────────

#[test]
fn library_entry_lifecycle() {
    let conn = seeded();
    insert_library_entry(&conn, "alice", "t1", T0).unwrap();

    let err = insert_library_entry(&conn, "alice", "t1", T1).unwrap_err();
    assert!(matches!(err, OperationError::DuplicateLibraryEntry { .. }));

    assert!(delete_library_entry(&conn, "alice", "t1").unwrap());
    assert!(!delete_library_entry(&conn, "alice", "t1").unwrap());
}

#[test]
fn library_entry_for_missing_title_is_a_store_error() {
    let conn = open_memory().unwrap();
    let err = insert_library_entry(&conn, "alice", "ghost", T0).unwrap_err();
    assert!(matches!(err, OperationError::Sqlite(_)));
}

#[test]
fn unseen_flag_set_and_cleared() {
    let conn = seeded();
    insert_chapters(&conn, &[chapter("t1", "c0", 0.0)], T0).unwrap();
    insert_library_entry(&conn, "alice", "t1", T0).unwrap();
    insert_library_entry(&conn, "bob", "t1", T0).unwrap();

    assert_eq!(flag_unseen_for_title(&conn, "t1").unwrap(), 2);
    assert_eq!(flag_unseen_for_title(&conn, "t1").unwrap(), 0);

    assert!(set_last_read(&conn, "alice", "t1", "c0", true).unwrap());
    assert!(!get_library_entry(&conn, "alice", "t1").unwrap().unwrap().has_unseen);
    assert!(get_library_entry(&conn, "bob", "t1").unwrap().unwrap().has_unseen);
    assert!(!set_last_read(&conn, "carol", "t1", "c0", true).unwrap());
}

#[test]
fn update_library_entry_is_partial() {
    let conn = seeded();
    insert_library_entry(&conn, "alice", "t1", T0).unwrap();

    let update = LibraryUpdate {
        favourite: Some(true),
        rating: Some(Some(9)),
        notes: Some(Some("great".to_string())),
    };
    assert!(update_library_entry(&conn, "alice", "t1", &update).unwrap());

    let clear_notes = LibraryUpdate {
        notes: Some(None),
        ..Default::default()
    };
    assert!(update_library_entry(&conn, "alice", "t1", &clear_notes).unwrap());

    let entry = get_library_entry(&conn, "alice", "t1").unwrap().unwrap();
    assert!(entry.favourite);
    assert_eq!(entry.rating, Some(9));
    assert_eq!(entry.notes, None);

    assert!(!update_library_entry(&conn, "bob", "t1", &update).unwrap());
}

#[test]
fn reading_progress_upserts() {
    let conn = seeded();
    insert_chapters(&conn, &[chapter("t1", "c0", 0.0)], T0).unwrap();

    let mut progress = ReadingProgress {
        user_id: "alice".to_string(),
        chapter_id: "c0".to_string(),
        percentage: 40.0,
        completed: false,
        last_read_at: T0.to_string(),
    };
    upsert_reading_progress(&conn, &progress).unwrap();
    progress.percentage = 99.0;
    progress.completed = true;
    progress.last_read_at = T1.to_string();
    upsert_reading_progress(&conn, &progress).unwrap();

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM reading_progress"), 1);
    let stored = get_reading_progress(&conn, "alice", "c0").unwrap().unwrap();
    assert_eq!(stored.percentage, 99.0);
    assert!(stored.completed);
    assert_eq!(stored.last_read_at, T1);
}
