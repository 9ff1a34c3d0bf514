use std::collections::BTreeSet;

use anyhow::{bail, Context};
use colored::Colorize;

use snap_content::MenuData;
use snap_server::{AppState, SiteConfig, SnapServer};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::History(args) => cmd_history(config, args).await,
        Command::Show(args) => cmd_show(config, args).await,
        Command::Restore(args) => cmd_restore(config, args).await,
        Command::Prune(args) => cmd_prune(config, args).await,
        Command::Gc(args) => cmd_gc(config, args).await,
        Command::Check(_) => cmd_check(config).await,
    }
}

/// Config file (or defaults), then environment, then command-line flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<SiteConfig> {
    let base = match &cli.config {
        Some(path) => SiteConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SiteConfig::default(),
    };
    let mut config = base.with_env();
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

async fn open(config: SiteConfig) -> anyhow::Result<AppState> {
    let root = config.root.clone();
    AppState::bootstrap(config)
        .await
        .with_context(|| format!("opening site at {}", root.display()))
}

async fn cmd_serve(mut config: SiteConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "{} SnapMenu on {} (root: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.root.display()
    );
    SnapServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_history(config: SiteConfig, args: HistoryArgs) -> anyhow::Result<()> {
    let state = open(config).await?;
    let history = state.content.history().await?;
    if history.is_empty() {
        println!("No backups.");
        return Ok(());
    }
    for (i, entry) in history.iter().take(args.limit).enumerate() {
        let marker = if i == 0 { "latest".green().to_string() } else { String::new() };
        println!("{}  {}", entry.timestamp.yellow(), marker);
    }
    if history.len() > args.limit {
        println!("{}", format!("... {} more", history.len() - args.limit).dimmed());
    }
    Ok(())
}

async fn cmd_show(config: SiteConfig, args: ShowArgs) -> anyhow::Result<()> {
    let state = open(config).await?;
    let content = state.content.get_version(&args.timestamp).await?;
    println!("{}", serde_json::to_string_pretty(&content)?);
    Ok(())
}

async fn cmd_restore(config: SiteConfig, args: RestoreArgs) -> anyhow::Result<()> {
    let state = open(config).await?;
    state.content.restore(&args.timestamp).await?;
    println!(
        "{} Restored content from {}",
        "✓".green().bold(),
        args.timestamp.yellow()
    );
    Ok(())
}

async fn cmd_prune(config: SiteConfig, args: PruneArgs) -> anyhow::Result<()> {
    let keep = args.keep.unwrap_or(config.keep_backups);
    let state = open(config).await?;
    let summary = state.content.prune_backups(keep).await?;
    println!(
        "{} Pruned {} backups, {} kept.",
        "✓".green(),
        summary.deleted.len().to_string().bold(),
        summary.kept
    );
    for name in &summary.failed {
        println!("  {} {}", "could not delete:".red(), name);
    }
    Ok(())
}

async fn cmd_gc(config: SiteConfig, args: GcArgs) -> anyhow::Result<()> {
    let state = open(config).await?;
    if args.dry_run {
        let used = state.content.collect_used_images().await?;
        let unused = unreferenced(state.images.list_tracked(), &used);
        if unused.is_empty() {
            println!("Nothing to collect.");
        }
        for url in &unused {
            println!("  {} {}", "would delete:".yellow(), url);
        }
        return Ok(());
    }

    let report = state.content.garbage_collect_images().await?;
    println!(
        "{} GC: {} of {} images removed.",
        "✓".green(),
        report.deleted.len().to_string().bold(),
        report.scanned
    );
    for name in &report.failed {
        println!("  {} {}", "could not delete:".red(), name);
    }
    Ok(())
}

async fn cmd_check(config: SiteConfig) -> anyhow::Result<()> {
    let state = open(config).await?;
    let mut problems = 0usize;

    match state.content.read().await {
        Ok(content) => match snap_content::validate(&content) {
            Ok(()) => {
                let invalid = state.content.validate_image_references(&content).await;
                for bad in &invalid {
                    println!("  {} {} → {}", "missing image:".red(), bad.path, bad.url);
                }
                problems += invalid.len();
                if invalid.is_empty() {
                    println!("{} Content valid", "✓".green());
                }
            }
            Err(e) => {
                println!("{} Content invalid: {e}", "✗".red().bold());
                problems += 1;
            }
        },
        Err(e) => {
            println!("{} Content unreadable: {e}", "✗".red().bold());
            problems += 1;
        }
    }

    match state.menu.read_all().await {
        Ok(menu) => println!("{} Menu valid ({} items)", "✓".green(), menu_size(&menu)),
        Err(e) => {
            println!("{} Menu unreadable: {e}", "✗".red().bold());
            problems += 1;
        }
    }

    let backups = state.content.history().await?;
    println!("  {} backups on disk", backups.len());

    if problems > 0 {
        bail!("{problems} problem(s) found");
    }
    Ok(())
}

fn unreferenced(tracked: Vec<String>, used: &BTreeSet<String>) -> Vec<String> {
    tracked.into_iter().filter(|url| !used.contains(url)).collect()
}

fn menu_size(menu: &MenuData) -> usize {
    snap_content::MenuCategory::ALL
        .iter()
        .map(|c| menu.items(*c).len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn unreferenced_filters_used() {
        let used = BTreeSet::from(["/uploads/images/a.png".to_string()]);
        let tracked = vec![
            "/uploads/images/a.png".to_string(),
            "/uploads/images/b.png".to_string(),
        ];
        assert_eq!(unreferenced(tracked, &used), vec!["/uploads/images/b.png"]);
    }

    #[test]
    fn root_flag_overrides_config() {
        let cli = Cli::try_parse_from(["snapmenu", "--root", "/srv/x", "check"]).unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.root, std::path::PathBuf::from("/srv/x"));
    }

    #[tokio::test]
    async fn check_fails_without_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(cmd_check(config).await.is_err());
    }

    #[tokio::test]
    async fn restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let state = open(config.clone()).await.unwrap();
        state.content.commit(&serde_json::json!({ "v": 1 })).await.unwrap();
        let report = state.content.commit(&serde_json::json!({ "v": 2 })).await.unwrap();
        let timestamp = report.backup.unwrap().timestamp;

        cmd_restore(config, RestoreArgs { timestamp }).await.unwrap();
        assert_eq!(
            state.content.read().await.unwrap(),
            serde_json::json!({ "v": 1 })
        );
    }
}
