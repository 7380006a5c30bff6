use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use kaze_catalog::{ChapterIndex, ChapterOrder, Provider};

use crate::CliError;

use super::{find_chapter, find_title, runtime, truncate_str, Context};

/// List every title, or the ones matching a search query.
pub(crate) fn run_titles(ctx: &Context, search: Option<&str>) -> Result<(), CliError> {
    let conn = ctx.open_db()?;

    let titles = match search {
        Some(query) => {
            if query.trim().chars().count() < kaze_db::MIN_SEARCH_LEN {
                log::warn!(
                    "Search needs at least {} characters",
                    kaze_db::MIN_SEARCH_LEN
                );
                return Ok(());
            }
            kaze_db::search_titles(&conn, query)?
        }
        None => kaze_db::list_titles(&conn)?,
    };

    if titles.is_empty() {
        println!("{}", "No titles found.".if_supports_color(Stdout, |t| t.dimmed()));
        return Ok(());
    }

    println!(
        "{:<32} {:<40} {:>8}  {}",
        "SLUG", "TITLE", "CHAPTERS", "LAST CHECKED"
    );
    for title in &titles {
        println!(
            "{:<32} {:<40} {:>8}  {}",
            truncate_str(&title.slug, 32).if_supports_color(Stdout, |t| t.cyan()),
            truncate_str(&title.title, 40),
            title.chapters_count,
            title.last_checked_at.as_deref().unwrap_or("never"),
        );
    }
    Ok(())
}

/// List the chapters of a title.
pub(crate) fn run_chapters(ctx: &Context, slug: &str, desc: bool) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    let order = if desc {
        ChapterOrder::Descending
    } else {
        ChapterOrder::Ascending
    };
    let chapters = kaze_db::chapters_for_title(&conn, &title.id, order)?;

    println!(
        "{} ({} chapters)",
        title.title.if_supports_color(Stdout, |t| t.bold()),
        chapters.len(),
    );
    for chapter in &chapters {
        println!(
            "  {:>7}  {:<10} {:<12} {}",
            chapter.index.to_string(),
            chapter.provider.as_str(),
            chapter
                .released_at
                .as_deref()
                .map(|d| d.get(..10).unwrap_or(d))
                .unwrap_or("-"),
            chapter.title.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

/// Print the page references of one chapter, fetching them if needed.
pub(crate) fn run_pages(ctx: &Context, slug: &str, index: ChapterIndex) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    let chapter = find_chapter(&conn, &title, index)?;
    let registry = ctx.registry()?;

    let rt = runtime();
    let pages = rt.block_on(kaze_sync::backfill_pages(&conn, &registry, &chapter.id))?;
    if pages.is_empty() {
        log::warn!("No pages available for {} chapter {}", slug, index);
    }
    for page in pages {
        println!("{}", page);
    }
    Ok(())
}

/// Switch the preferred sync source of a title.
pub(crate) fn run_link_preferred(
    ctx: &Context,
    slug: &str,
    provider: Provider,
) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let title = find_title(&conn, slug)?;
    kaze_db::set_preferred_link(&conn, &title.id, provider)?;
    println!(
        "{} {} now syncs from {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        slug.if_supports_color(Stdout, |t| t.cyan()),
        provider.display_name(),
    );
    Ok(())
}

pub(crate) fn run_stats(ctx: &Context) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let stats = kaze_db::store_stats(&conn)?;

    println!("{}", "Store Statistics".if_supports_color(Stdout, |t| t.bold()));
    println!("  Database: {}", ctx.db_path.display());
    println!();
    println!("  Titles:          {:>8}", stats.titles);
    println!("  Never checked:   {:>8}", stats.never_checked);
    println!("  Source links:    {:>8}", stats.source_links);
    println!("  Chapters:        {:>8}", stats.chapters);
    println!("  Library entries: {:>8}", stats.library_entries);
    Ok(())
}
