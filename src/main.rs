//!
//! src/main.rs  Oct 16th, 2026
//!
//! Entry point: loads configuration, sets up logging, builds the Jellyfin
//! and Plex clients and runs one migration. The report goes to stdout,
//! everything else to stderr.
//!

mod cli;
mod config;
mod errors;
mod logging;

mod catalog;
mod fetch;
mod jellyfin;
mod plex;

mod engine;
mod index;
mod path;
mod plan;
mod report;
mod types;

mod migrator;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use crate::cli::Cli;
use crate::errors::MigrateError;
use crate::jellyfin::JellyfinClient;
use crate::migrator::Migrator;
use crate::plex::PlexClient;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match logging::init_logging(&config::logging_config(&cli)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "migrate.exit");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<(), MigrateError> {
    let cfgs = config::load_config(cli, config::prompt_secret)?;
    info!(
        service = "playlist-migrator",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let jellyfin = JellyfinClient::new(&cfgs.http, &cfgs.jellyfin)?;
    let plex = PlexClient::new(&cfgs.http, &cfgs.plex)?;
    let migration = &cfgs.migration;

    let mut migrator = Migrator::new(&jellyfin, &plex, migration);
    match migrator.run().await {
        Ok(outcome) => {
            let summary = report::summarize(&outcome.plan, &outcome.source_playlist_name);
            let summary = report::confirm(summary, &outcome);
            println!("{}", summary.render(migration.report_format)?);
            Ok(())
        }
        Err(failure) => {
            // the plan survives only a failed write; show what was attempted
            if let Some(plan) = &failure.plan {
                let name = failure
                    .source_playlist_name
                    .as_deref()
                    .unwrap_or(&migration.playlist_name);
                let summary = report::mark_failed(report::summarize(plan, name));
                println!("{}", summary.render(migration.report_format)?);
            }
            Err(failure.error)
        }
    }
}

/// Live smoke tests against real servers, configured from the environment
#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SourceCatalog, TargetCatalog};
    use crate::config::{AppConfig, load_config};

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    fn live_config(dry_run: bool) -> Result<AppConfig, MigrateError> {
        dotenvy::dotenv().ok();
        let playlist = std::env::var("LIVE_PLAYLIST")
            .map_err(|_| MigrateError::Config("LIVE_PLAYLIST was not set".to_string()))?;
        let mut argv = vec!["playlist-migrator".to_string(), playlist];
        if dry_run {
            argv.push("--dry-run".to_string());
        }
        let cli = Cli::try_parse_from(argv).map_err(|e| MigrateError::Config(e.to_string()))?;
        load_config(&cli, |_| Err(MigrateError::Config("set PLEX_PASSWORD".to_string())))
    }

    #[tokio::test]
    async fn jellyfin_playlist_testbench() -> Result<(), MigrateError> {
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(());
        }

        let cfgs = live_config(true)?;
        let jellyfin = JellyfinClient::new(&cfgs.http, &cfgs.jellyfin)?;
        let playlist = jellyfin.fetch_playlist_by_name(&cfgs.migration.playlist_name).await?;
        println!("playlist {} ({}): {} items", playlist.name, playlist.id, playlist.items.len());
        for item in playlist.items.iter().take(5) {
            println!("  #{} {} {}", item.sequence_index, item.title, item.absolute_path);
        }
        Ok(())
    }

    #[tokio::test]
    async fn plex_library_testbench() -> Result<(), MigrateError> {
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(());
        }

        let cfgs = live_config(true)?;
        let plex = PlexClient::new(&cfgs.http, &cfgs.plex)?;
        let items = plex.enumerate_library_items().await?;
        assert!(!items.is_empty());
        println!("plex library: {} parts", items.len());
        Ok(())
    }

    #[tokio::test]
    async fn dry_run_testbench() -> Result<(), MigrateError> {
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(());
        }

        let cfgs = live_config(true)?;
        let jellyfin = JellyfinClient::new(&cfgs.http, &cfgs.jellyfin)?;
        let plex = PlexClient::new(&cfgs.http, &cfgs.plex)?;
        let outcome = Migrator::new(&jellyfin, &plex, &cfgs.migration)
            .run()
            .await
            .map_err(|f| f.error)?;
        assert!(!outcome.applied);

        let summary = report::summarize(&outcome.plan, &outcome.source_playlist_name);
        println!("{summary}");
        Ok(())
    }
}
