use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use crate::CliError;

use super::{runtime, Context};

/// Resolve a provider title to its canonical record, creating it if new.
pub(crate) fn run_import(
    ctx: &Context,
    provider: &str,
    provider_id: &str,
    fallback_title: Option<&str>,
    sync: bool,
) -> Result<(), CliError> {
    let conn = ctx.open_db()?;
    let registry = ctx.registry()?;
    let policy = ctx.settings.sync.match_policy;

    let rt = runtime();
    rt.block_on(async {
        let resolved = kaze_sync::resolve(
            &conn,
            &registry,
            provider,
            provider_id,
            fallback_title,
            policy,
        )
        .await?;

        let status = if resolved.is_new { "Imported" } else { "Already known" };
        println!(
            "{} {} {}",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            status,
            resolved.slug.if_supports_color(Stdout, |t| t.cyan()),
        );

        if sync {
            let outcome = kaze_sync::sync_title(
                &conn,
                &registry,
                &resolved.title_id,
                provider,
                provider_id,
            )
            .await?;
            println!("  {} new chapters", outcome.added_count);
        }
        Ok::<(), CliError>(())
    })
}
