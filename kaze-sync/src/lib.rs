//! Title synchronization engine.
//!
//! Resolves provider titles to canonical records, merges newly published
//! chapters into the store, runs bounded batch syncs over the stalest
//! titles, and tracks each user's library and reading progress.
//!
//! Every operation takes the database connection explicitly; the caller
//! owns its lifecycle.

pub mod batch;
pub mod error;
pub mod library;
pub mod merge;
pub mod pages;
pub mod progress;
pub mod resolver;
pub mod settings;
pub mod trigger;

pub use batch::{run_batch, BatchOptions, BatchSummary, TitleError};
pub use error::SyncError;
pub use library::{AddOutcome, LibraryItem, RemoveOutcome, UpdateOutcome};
pub use merge::{sync_title, sync_title_by_slug, SyncOutcome};
pub use pages::backfill_pages;
pub use progress::{BatchProgress, LogProgress, SilentProgress};
pub use resolver::{resolve, MatchPolicy, Resolved};
pub use settings::{Settings, SettingsError};
pub use trigger::{BatchResponse, Environment};
