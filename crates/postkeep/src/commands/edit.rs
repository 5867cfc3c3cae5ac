//! Edit command handlers. Every write is preceded by a snapshot.

use super::Context;
use anyhow::Context as _;
use postkeep_cms::{PostQuery, PostStatus};
use postkeep_core::{EditOp, EditOutcome, EditReport};
use postkeep_snapshot::{PostField, PostId};
use regex::Regex;
use std::path::PathBuf;

/// Handle replace command.
pub async fn handle_replace(
    ctx: &Context,
    pattern: &str,
    replacement: &str,
    post_ids: &[PostId],
    label: &str,
) -> anyhow::Result<()> {
    let pattern = Regex::new(pattern).with_context(|| format!("Invalid pattern: {pattern}"))?;
    let editor = ctx.editor().await?;

    let op = EditOp::Replace {
        pattern,
        replacement: replacement.to_string(),
        label: label.to_string(),
    };
    let report = editor.apply_batch(post_ids, &op).await;
    print_report(&report);
    Ok(())
}

/// Handle set command.
pub async fn handle_set(
    ctx: &Context,
    post_id: PostId,
    field: PostField,
    value: Option<String>,
    from_file: Option<PathBuf>,
    label: &str,
) -> anyhow::Result<()> {
    let value = match (value, from_file) {
        (_, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (Some(value), None) => value,
        (None, None) => anyhow::bail!("No value given"),
    };

    let op = EditOp::Set {
        field,
        value,
        label: label.to_string(),
    };
    let editor = ctx.editor().await?;
    let outcome = editor.apply(post_id, &op).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Handle status command.
pub async fn handle_status(
    ctx: &Context,
    status: PostStatus,
    post_ids: &[PostId],
) -> anyhow::Result<()> {
    let editor = ctx.editor().await?;
    let report = editor.apply_batch(post_ids, &EditOp::Status(status)).await;
    print_report(&report);
    Ok(())
}

/// Handle migrate-seo command.
pub async fn handle_migrate_seo(
    ctx: &Context,
    post_ids: Vec<PostId>,
    all: bool,
    search: Option<String>,
) -> anyhow::Result<()> {
    let query = match search {
        Some(term) => Some(PostQuery::search(term)),
        None if all => Some(PostQuery::default()),
        None => None,
    };

    let post_ids = match query {
        Some(query) => {
            let client = ctx.client()?;
            let posts = client
                .list_all_posts(&query.with_statuses(&[PostStatus::Publish]))
                .await?;
            println!("Found {} published posts", posts.len());
            posts.iter().map(|p| p.post_id()).collect()
        }
        None => post_ids,
    };

    if post_ids.is_empty() {
        println!("No posts to migrate. Pass post IDs, --all or --search.");
        return Ok(());
    }

    let editor = ctx.editor().await?;
    let report = editor
        .apply_batch(&post_ids, &EditOp::MigrateExcerptToSeo)
        .await;
    print_report(&report);
    Ok(())
}

fn print_outcome(outcome: &EditOutcome) {
    match outcome {
        EditOutcome::Updated { post_id, snapshots } => {
            println!("  updated    post {post_id}");
            for path in snapshots {
                println!("             backup {}", path.display());
            }
        }
        EditOutcome::Unchanged { post_id } => println!("  unchanged  post {post_id}"),
        EditOutcome::Skipped { post_id, reason } => {
            println!("  skipped    post {post_id}: {reason}")
        }
    }
}

fn print_report(report: &EditReport) {
    for outcome in &report.outcomes {
        print_outcome(outcome);
    }
    for failure in &report.failed {
        println!("  failed     post {}: {}", failure.post_id, failure.error);
    }
    println!();
    let total = report.outcomes.len() + report.failed.len();
    if report.is_clean() {
        println!("Updated {} of {} posts", report.updated_count(), total);
    } else {
        println!(
            "Updated {} of {} posts ({} failed)",
            report.updated_count(),
            total,
            report.failure_count()
        );
    }
}
