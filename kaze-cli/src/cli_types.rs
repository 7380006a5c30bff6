//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use kaze_catalog::{ChapterIndex, Provider};

#[derive(Parser)]
#[command(name = "kaze")]
#[command(about = "Track manga titles across providers and sync new chapters", long_about = None)]
pub(crate) struct Cli {
    /// Database path (defaults to the settings file, then the data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Only show warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Sync the stalest titles against their providers
    Sync {
        /// Maximum number of titles to check
        #[arg(short, long)]
        limit: Option<u32>,

        /// Concurrent provider fetches
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Sync one title through its preferred source link
    SyncTitle {
        /// Title slug
        slug: String,
    },

    /// Import a title from a provider, or find the one it already maps to
    Import {
        /// Provider name (e.g., mangadex, comick)
        provider: String,

        /// Provider-local id
        provider_id: String,

        /// Display title to use when the provider has none
        #[arg(long)]
        title: Option<String>,

        /// Sync chapters right after importing
        #[arg(long)]
        sync: bool,
    },

    /// List or search titles
    Titles {
        /// Case-insensitive search over title and author (min. 3 characters)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// List the chapters of a title
    Chapters {
        /// Title slug
        slug: String,

        /// Newest first
        #[arg(long)]
        desc: bool,
    },

    /// Show the page references of a chapter, fetching them if needed
    Pages {
        /// Title slug
        slug: String,

        /// Chapter index (e.g., 12 or 10.5)
        index: ChapterIndex,
    },

    /// Make a provider the preferred sync source of a title
    LinkPreferred {
        /// Title slug
        slug: String,

        /// Provider name
        provider: Provider,
    },

    /// Manage a user's library
    Library {
        /// User id
        #[arg(short, long)]
        user: String,

        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Record reading progress on a chapter
    Progress {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Title slug
        slug: String,

        /// Chapter index
        index: ChapterIndex,

        /// Percentage read (0-100)
        percentage: f64,
    },

    /// Show store statistics
    Stats,

    /// Serve the batch sync trigger over HTTP
    Serve {
        /// Address to bind (defaults to the settings file)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum LibraryAction {
    /// Start tracking a title
    Add { slug: String },

    /// Stop tracking a title
    Remove { slug: String },

    /// List tracked titles
    List,

    /// Change favourite, rating, or notes
    Update {
        slug: String,

        #[arg(long)]
        favourite: Option<bool>,

        /// Rating from 0 to 10
        #[arg(long, conflicts_with = "clear_rating")]
        rating: Option<u8>,

        #[arg(long)]
        clear_rating: bool,

        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        #[arg(long)]
        clear_notes: bool,
    },

    /// Set the last-read chapter of a tracked title
    MarkRead {
        slug: String,
        index: ChapterIndex,
    },
}
