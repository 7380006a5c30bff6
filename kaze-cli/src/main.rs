//! kaze CLI
//!
//! Command-line interface for importing manga titles, syncing new chapters,
//! and managing per-user libraries.

mod cli_types;
mod commands;
mod error;

use clap::Parser;

pub(crate) use error::CliError;

use cli_types::{Cli, Commands, LibraryAction};
use commands::Context;

fn init_logging(quiet: bool, verbose: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    if !verbose {
        builder.format_timestamp(None).format_target(false);
    }
    builder.init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::load(cli.db)?;

    match cli.command {
        Commands::Sync { limit, workers } => commands::sync::run_sync(&ctx, limit, workers),
        Commands::SyncTitle { slug } => commands::sync::run_sync_title(&ctx, &slug),
        Commands::Import {
            provider,
            provider_id,
            title,
            sync,
        } => commands::import::run_import(&ctx, &provider, &provider_id, title.as_deref(), sync),
        Commands::Titles { search } => commands::titles::run_titles(&ctx, search.as_deref()),
        Commands::Chapters { slug, desc } => commands::titles::run_chapters(&ctx, &slug, desc),
        Commands::Pages { slug, index } => commands::titles::run_pages(&ctx, &slug, index),
        Commands::LinkPreferred { slug, provider } => {
            commands::titles::run_link_preferred(&ctx, &slug, provider)
        }
        Commands::Library { user, action } => match action {
            LibraryAction::Add { slug } => commands::library::run_add(&ctx, &user, &slug),
            LibraryAction::Remove { slug } => commands::library::run_remove(&ctx, &user, &slug),
            LibraryAction::List => commands::library::run_list(&ctx, &user),
            LibraryAction::Update {
                slug,
                favourite,
                rating,
                clear_rating,
                notes,
                clear_notes,
            } => {
                let update = kaze_catalog::LibraryUpdate {
                    favourite,
                    rating: if clear_rating { Some(None) } else { rating.map(Some) },
                    notes: if clear_notes { Some(None) } else { notes.map(Some) },
                };
                commands::library::run_update(&ctx, &user, &slug, &update)
            }
            LibraryAction::MarkRead { slug, index } => {
                commands::library::run_mark_read(&ctx, &user, &slug, index)
            }
        },
        Commands::Progress {
            user,
            slug,
            index,
            percentage,
        } => commands::library::run_progress(&ctx, &user, &slug, index, percentage),
        Commands::Stats => commands::titles::run_stats(&ctx),
        Commands::Serve { bind } => commands::serve::run_serve(&ctx, bind),
    }
}
