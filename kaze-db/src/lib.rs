//! SQLite persistence layer for the title store.
//!
//! Provides schema creation, write operations, and query APIs
//! backed by SQLite (via rusqlite with bundled feature).

pub mod operations;
pub mod queries;
pub mod schema;

pub use operations::{
    backfill_chapter_pages, delete_library_entry, flag_unseen_for_title, insert_chapters,
    insert_library_entry, insert_source_link, insert_title_with_link, mark_link_checked,
    mark_title_checked, now_timestamp, refresh_title_metadata, set_last_read, set_preferred_link,
    update_library_entry, upsert_reading_progress, OperationError,
};
pub use queries::{
    chapter_indices, chapters_for_title, count_chapters, find_chapter, find_link,
    find_title_match, get_chapter, get_library_entry, get_reading_progress, get_title,
    get_title_by_slug, latest_chapter, library_for_user, links_for_title, list_titles,
    preferred_link, search_titles, slug_exists, stale_titles, store_stats, LibraryRow,
    StoreStats, MAX_SEARCH_RESULTS, MIN_SEARCH_LEN,
};
pub use schema::{open_database, open_memory, SchemaError};
