use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use kaze_sync::batch::MAX_WORKERS;
use kaze_sync::{BatchSummary, LogProgress};

use crate::CliError;

use super::{runtime, Context};

/// Run one batch over the stalest titles and print the summary.
pub(crate) fn run_sync(
    ctx: &Context,
    limit: Option<u32>,
    workers: Option<usize>,
) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let registry = ctx.registry()?;

    let mut options = ctx.settings.batch_options();
    if let Some(limit) = limit {
        options.limit = limit;
    }
    if let Some(workers) = workers {
        options.max_workers = workers.clamp(1, MAX_WORKERS);
    }

    let rt = runtime();
    let summary = rt.block_on(kaze_sync::run_batch(&conn, &registry, &options, &LogProgress))?;
    print_summary(&summary);
    Ok(())
}

/// Sync one title through its preferred link.
pub(crate) fn run_sync_title(ctx: &Context, slug: &str) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let registry = ctx.registry()?;

    let rt = runtime();
    let outcome = rt.block_on(kaze_sync::sync_title_by_slug(&conn, &registry, slug))?;

    println!(
        "{} {}: {} new chapters{}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        slug.if_supports_color(Stdout, |t| t.cyan()),
        outcome.added_count,
        if outcome.updated_metadata {
            ", metadata updated"
        } else {
            ""
        },
    );
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!(
        "{}",
        "Batch Sync Summary".if_supports_color(Stdout, |t| t.bold()),
    );
    println!("  Checked:        {:>6}", summary.titles_checked);
    println!("  Updated:        {:>6}", summary.titles_updated);
    println!("  New chapters:   {:>6}", summary.chapters_added);
    if summary.titles_skipped > 0 {
        println!("  Skipped:        {:>6}", summary.titles_skipped);
    }
    if !summary.per_title_errors.is_empty() {
        println!(
            "  {}         {:>6}",
            "Failed:".if_supports_color(Stdout, |t| t.red()),
            summary.per_title_errors.len(),
        );
        for failure in &summary.per_title_errors {
            println!(
                "    {} {}",
                failure.title_id.if_supports_color(Stdout, |t| t.dimmed()),
                failure.error,
            );
        }
    }
}
