//! Snapshot command handlers: capture, restore, list and diff.

use super::Context;
use anyhow::Context as _;
use postkeep_snapshot::{parse_plan, PostField, PostId};
use std::path::{Path, PathBuf};

/// Handle capture command.
pub async fn handle_capture(
    ctx: &Context,
    post_id: PostId,
    field: PostField,
    label: &str,
) -> anyhow::Result<()> {
    let store = ctx.connected_store().await?;
    let snapshot = store.fetch_and_capture(post_id, field, label).await?;

    println!(
        "Captured post {} {} ({} bytes)",
        post_id,
        field,
        snapshot.content.len()
    );
    println!("  {}", snapshot.path.display());
    Ok(())
}

/// Handle restore command.
pub async fn handle_restore(
    ctx: &Context,
    post_id: PostId,
    snapshot: Option<PathBuf>,
    field: PostField,
) -> anyhow::Result<()> {
    let store = ctx.store().await?;
    let restored = match snapshot {
        Some(path) => store.restore(post_id, &path).await?,
        None => store.restore_latest(post_id, field).await?,
    };

    println!(
        "Restored post {} {} from {}",
        post_id,
        restored.field(),
        restored.path.display()
    );
    Ok(())
}

/// Handle restore-batch command.
///
/// Per-post failures are reported but do not fail the command.
pub async fn handle_restore_batch(ctx: &Context, plan: &Path, json: bool) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(plan)
        .await
        .with_context(|| format!("Failed to read plan file {}", plan.display()))?;
    let items = parse_plan(&text)?;
    if items.is_empty() {
        println!("Plan is empty.");
        return Ok(());
    }

    let store = ctx.store().await?;
    let report = store.restore_batch(&items).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (post_id, path) in &report.succeeded {
        println!("  ok      post {post_id} <- {}", path.display());
    }
    for failure in &report.failed {
        println!("  failed  post {}: {}", failure.post_id, failure.error);
    }
    println!();
    println!(
        "Restored {} of {} posts ({} failed)",
        report.success_count(),
        report.total(),
        report.failure_count()
    );
    Ok(())
}

/// Handle list command.
pub async fn handle_list(ctx: &Context, post_id: Option<PostId>) -> anyhow::Result<()> {
    let store = ctx.store().await?;
    let snapshots = match post_id {
        Some(id) => store.list_for(id).await?,
        None => store.list().await?,
    };

    if snapshots.is_empty() {
        println!("No snapshots in {}", store.base_dir().display());
        return Ok(());
    }

    println!(
        "{:<8} {:<8} {:<10} {:<23} {:>8}  FILE",
        "POST", "FIELD", "LABEL", "CAPTURED", "BYTES"
    );
    for info in &snapshots {
        let name = info
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!(
            "{:<8} {:<8} {:<10} {:<23} {:>8}  {}",
            info.key.post_id.to_string(),
            info.key.field.as_str(),
            info.key.label,
            info.key.captured_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            info.size,
            name
        );
    }
    Ok(())
}

/// Handle diff command.
pub async fn handle_diff(ctx: &Context, post_id: PostId, snapshot: &Path) -> anyhow::Result<()> {
    let store = ctx.connected_store().await?;
    let diff = store.diff(post_id, snapshot).await?;

    if diff.lines().nth(2).is_none() {
        println!("No changes since {}", snapshot.display());
    } else {
        print!("{diff}");
    }
    Ok(())
}
