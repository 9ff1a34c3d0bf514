use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "snapmenu",
    about = "SnapMenu content backend: serve the admin API and manage site content",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Site root (overrides config file and SNAPMENU_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP and WebSocket server
    Serve(ServeArgs),
    /// List content backups, newest first
    History(HistoryArgs),
    /// Print a stored content version
    Show(ShowArgs),
    /// Make a stored version the live content
    Restore(RestoreArgs),
    /// Delete old content backups
    Prune(PruneArgs),
    /// Delete uploaded images the content no longer references
    Gc(GcArgs),
    /// Validate the live content, its image references and the menu
    Check(CheckArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (overrides config file and SNAPMENU_BIND)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct HistoryArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    pub timestamp: String,
}

#[derive(Args)]
pub struct RestoreArgs {
    pub timestamp: String,
}

#[derive(Args)]
pub struct PruneArgs {
    /// Backups to keep (defaults to the configured count)
    #[arg(short, long)]
    pub keep: Option<usize>,
}

#[derive(Args)]
pub struct GcArgs {
    /// Only list what would be deleted
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct CheckArgs {}
