use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use kaze_catalog::{ChapterIndex, LibraryUpdate};
use kaze_sync::library;
use kaze_sync::{AddOutcome, RemoveOutcome, UpdateOutcome};

use crate::CliError;

use super::{find_chapter, find_title, truncate_str, Context};

fn not_tracking(user: &str, slug: &str) {
    log::warn!("{} does not track '{}'", user, slug);
}

pub(crate) fn run_add(ctx: &Context, user: &str, slug: &str) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    match library::add_to_library(&conn, user, &title.id)? {
        AddOutcome::Added => println!(
            "{} Added {} to {}'s library",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            slug.if_supports_color(Stdout, |t| t.cyan()),
            user,
        ),
        AddOutcome::AlreadyTracking => log::info!("{} already tracks '{}'", user, slug),
    }
    Ok(())
}

pub(crate) fn run_remove(ctx: &Context, user: &str, slug: &str) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    match library::remove_from_library(&conn, user, &title.id)? {
        RemoveOutcome::Removed => println!("Removed {} from {}'s library", slug, user),
        RemoveOutcome::NotTracking => not_tracking(user, slug),
    }
    Ok(())
}

pub(crate) fn run_list(ctx: &Context, user: &str) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let items = library::list_library(&conn, user)?;

    if items.is_empty() {
        println!(
            "{}",
            format!("{}'s library is empty.", user).if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    }

    for item in &items {
        let marker = if item.has_new_chapter { "\u{25CF}" } else { " " };
        println!(
            "{} {:<40} {:>4}/{:<4} {}{}",
            marker.if_supports_color(Stdout, |t| t.yellow()),
            truncate_str(&item.title.title, 40),
            item.read_position,
            item.title.chapters_count,
            if item.entry.favourite { "\u{2605} " } else { "" },
            item.entry
                .rating
                .map(|r| format!("{}/10", r))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

pub(crate) fn run_update(
    ctx: &Context,
    user: &str,
    slug: &str,
    update: &LibraryUpdate,
) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    match library::update_entry(&conn, user, &title.id, update)? {
        UpdateOutcome::Updated => println!("Updated {} for {}", slug, user),
        UpdateOutcome::NotTracking => not_tracking(user, slug),
    }
    Ok(())
}

pub(crate) fn run_mark_read(
    ctx: &Context,
    user: &str,
    slug: &str,
    index: ChapterIndex,
) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    let chapter = find_chapter(&conn, &title, index)?;
    match library::update_last_read(&conn, user, &title.id, &chapter.id)? {
        UpdateOutcome::Updated => println!("{} last read {} chapter {}", user, slug, index),
        UpdateOutcome::NotTracking => not_tracking(user, slug),
    }
    Ok(())
}

pub(crate) fn run_progress(
    ctx: &Context,
    user: &str,
    slug: &str,
    index: ChapterIndex,
    percentage: f64,
) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    let chapter = find_chapter(&conn, &title, index)?;
    let progress = library::record_progress(&conn, user, &chapter.id, percentage)?;
    println!(
        "{} chapter {}: {:.0}%{}",
        slug,
        index,
        progress.percentage,
        if progress.completed { " (completed)" } else { "" },
    );
    Ok(())
}
