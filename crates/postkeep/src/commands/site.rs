//! Site-level command handlers: mirror export, site backup, connection check
//! and config.

use super::Context;
use postkeep_cms::{User, WordPressClient};
use postkeep_core::{backup_site, refresh_mirror};
use std::path::PathBuf;

/// Handle export command.
pub async fn handle_export(ctx: &Context, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => ctx.cwd.join(path),
        None => ctx.config.articles_path(&ctx.cwd).ok_or_else(|| {
            anyhow::anyhow!("No mirror file given and export.articles_path is not configured")
        })?,
    };

    let client = ctx.client()?;
    println!("Refreshing {}", path.display());
    let report = refresh_mirror(&client, &path).await?;

    for url in &report.refreshed {
        println!("  refreshed  {url}");
    }
    for kept in &report.kept {
        println!(
            "  kept       {}: {}",
            kept.url.as_deref().unwrap_or("(no url)"),
            kept.reason
        );
    }
    println!();
    println!(
        "Refreshed {} of {} entries",
        report.refreshed.len(),
        report.total()
    );
    Ok(())
}

/// Handle backup-site command.
pub async fn handle_backup_site(ctx: &Context, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let root = match dir {
        Some(dir) => ctx.cwd.join(dir),
        None => postkeep_util::path::default_backup_dir(&ctx.cwd),
    };

    let client = ctx.client()?;
    let user = connect(&client).await?;
    println!("Connected to {} as {}", client.site_url(), user.name);

    let summary = backup_site(&client, &root).await?;
    for (name, count) in &summary.statistics {
        match summary.failed.get(name) {
            Some(error) => println!("  failed     {name}: {error}"),
            None => println!("  {:<10} {count}", name),
        }
    }
    println!();
    println!(
        "Backed up {} items to {}",
        summary.total_items,
        summary.backup_location.display()
    );
    Ok(())
}

/// Fetch the authenticated user, explaining a missing REST API.
async fn connect(client: &WordPressClient) -> anyhow::Result<User> {
    match client.current_user().await {
        Ok(user) => Ok(user),
        Err(e) if e.is_not_found() => anyhow::bail!(
            "No REST API at {}. Check site.url and that permalinks are enabled",
            client.api_url()
        ),
        Err(e) => Err(e.into()),
    }
}

/// Handle whoami command.
pub async fn handle_whoami(ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let user = connect(&client).await?;

    println!("Connected to {}", client.site_url());
    println!("  user: {} (id {})", user.name, user.id);
    Ok(())
}

/// Show configuration.
pub fn show_config(ctx: &Context) -> anyhow::Result<()> {
    println!("Configuration sources:");
    if ctx.sources.is_empty() {
        println!("  (none)");
    } else {
        for source in &ctx.sources {
            println!("  {}", source.display());
        }
    }
    println!();

    let mut config = ctx.config.clone();
    if let Some(password) = config.site.as_mut().and_then(|s| s.app_password.as_mut()) {
        *password = "<redacted>".to_string();
    }

    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!();
    println!("Snapshot directory: {}", ctx.snapshot_dir().display());

    Ok(())
}
