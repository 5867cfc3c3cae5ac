//! Postkeep - snapshot-guarded edits for WordPress posts.
//!
//! This is the main entry point for the postkeep CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use postkeep_cms::PostStatus;
use postkeep_core::Config;
use postkeep_snapshot::{PostField, PostId, DEFAULT_LABEL};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "postkeep")]
#[command(author, version, about = "Snapshot-guarded edits for WordPress posts", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding snapshots
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the current value of a post field to a snapshot
    Capture {
        /// Post ID
        post_id: PostId,
        /// Field to capture (content, excerpt, title, status, seo)
        #[arg(short, long, default_value = "content")]
        field: PostField,
        /// Label recorded in the snapshot name
        #[arg(short, long, default_value = DEFAULT_LABEL)]
        label: String,
    },
    /// Push a snapshot back to its post
    Restore {
        /// Post ID
        post_id: PostId,
        /// Snapshot file (defaults to the newest snapshot of --field)
        snapshot: Option<PathBuf>,
        /// Field to restore when no snapshot file is given
        #[arg(short, long, default_value = "content")]
        field: PostField,
    },
    /// Restore many posts from a plan file of `<post id> <snapshot>` lines
    RestoreBatch {
        /// Plan file
        plan: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List snapshots, newest first
    List {
        /// Only show snapshots of this post
        post_id: Option<PostId>,
    },
    /// Show what changed on the site since a snapshot
    Diff {
        /// Post ID
        post_id: PostId,
        /// Snapshot file
        snapshot: PathBuf,
    },
    /// Regex replace in post content
    Replace {
        /// Regular expression
        pattern: String,
        /// Replacement (supports `$1` style group references)
        replacement: String,
        /// Posts to edit
        #[arg(required = true, num_args = 1..)]
        post_ids: Vec<PostId>,
        /// Label recorded in the snapshot names
        #[arg(short, long, default_value = DEFAULT_LABEL)]
        label: String,
    },
    /// Overwrite one field of a post
    Set {
        /// Post ID
        post_id: PostId,
        /// Field to set (content, excerpt, title, status, seo)
        field: PostField,
        /// New value
        #[arg(required_unless_present = "from_file")]
        value: Option<String>,
        /// Read the new value from a file
        #[arg(long, conflicts_with = "value")]
        from_file: Option<PathBuf>,
        /// Label recorded in the snapshot name
        #[arg(short, long, default_value = DEFAULT_LABEL)]
        label: String,
    },
    /// Change the publication status of posts
    Status {
        /// Target status (publish, draft, private, pending, future)
        status: PostStatus,
        /// Posts to change
        #[arg(required = true, num_args = 1..)]
        post_ids: Vec<PostId>,
    },
    /// Move excerpts into the SEO description
    MigrateSeo {
        /// Posts to migrate
        post_ids: Vec<PostId>,
        /// Migrate every published post
        #[arg(long, conflicts_with = "post_ids")]
        all: bool,
        /// Migrate the published posts matching a search term
        #[arg(long, conflicts_with_all = ["post_ids", "all"])]
        search: Option<String>,
    },
    /// Refresh the portfolio mirror from the site
    Export {
        /// Mirror file (defaults to export.articles_path from the config)
        path: Option<PathBuf>,
    },
    /// Back up posts, pages, terms, media and users as JSON
    BackupSite {
        /// Directory to create the backup in (defaults to .postkeep/site-backups)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Check the connection and show the authenticated user
    Whoami,
    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Get current directory
    let cwd = std::env::current_dir()?;

    // Logging follows the config's level, so load it first
    let loaded = Config::load(Some(&cwd), cli.config.as_deref()).await;
    let level = loaded.as_ref().ok().and_then(|(config, _)| config.log_level());
    init_logging(cli.verbose, level, cli.log_file.clone())?;
    let (config, sources) = loaded?;

    let ctx = Context::new(cwd, config, sources, cli.snapshot_dir);
    tracing::debug!(
        sources = ctx.sources.len(),
        snapshot_dir = %ctx.snapshot_dir().display(),
        "Configuration loaded"
    );

    // Handle subcommands
    match cli.command {
        Commands::Capture {
            post_id,
            field,
            label,
        } => handle_capture(&ctx, post_id, field, &label).await,
        Commands::Restore {
            post_id,
            snapshot,
            field,
        } => handle_restore(&ctx, post_id, snapshot, field).await,
        Commands::RestoreBatch { plan, json } => handle_restore_batch(&ctx, &plan, json).await,
        Commands::List { post_id } => handle_list(&ctx, post_id).await,
        Commands::Diff { post_id, snapshot } => handle_diff(&ctx, post_id, &snapshot).await,
        Commands::Replace {
            pattern,
            replacement,
            post_ids,
            label,
        } => handle_replace(&ctx, &pattern, &replacement, &post_ids, &label).await,
        Commands::Set {
            post_id,
            field,
            value,
            from_file,
            label,
        } => handle_set(&ctx, post_id, field, value, from_file, &label).await,
        Commands::Status { status, post_ids } => handle_status(&ctx, status, &post_ids).await,
        Commands::MigrateSeo {
            post_ids,
            all,
            search,
        } => handle_migrate_seo(&ctx, post_ids, all, search).await,
        Commands::Export { path } => handle_export(&ctx, path).await,
        Commands::BackupSite { dir } => handle_backup_site(&ctx, dir).await,
        Commands::Whoami => handle_whoami(&ctx).await,
        Commands::Config => show_config(&ctx),
    }
}
