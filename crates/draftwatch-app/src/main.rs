//! draftwatch - live auction draft tracker - entry point.

use anyhow::Result;
use clap::Parser;
use draftwatch_app::{AppConfig, Application, FileModeStore};
use draftwatch_core::{PlayerId, StaticWatchlist, SystemClock};
use draftwatch_feed::HttpFeedClient;
use draftwatch_notify::StaticPreferences;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Live auction draft tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DRAFTWATCH_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Go live immediately instead of restoring the persisted mode
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    draftwatch_app::logging::init_logging();
    info!("Starting draftwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    info!(
        session = %config.feed.session_id,
        feed = %config.feed.base_url,
        "Configuration loaded"
    );

    let client = Arc::new(HttpFeedClient::new(
        config.feed.base_url.clone(),
        Some(Duration::from_millis(config.feed.request_timeout_ms)),
    )?);
    let watchlist = Arc::new(StaticWatchlist(
        config.watchlist.iter().map(|p| PlayerId::new(p.as_str())).collect(),
    ));
    let preferences = Arc::new(StaticPreferences(config.notifications.clone()));
    let mode_store = Arc::new(FileModeStore::new(config.mode_path.clone()));

    let (command_tx, mut command_rx) = mpsc::channel(32);
    let app = Application::new(
        &config,
        client,
        watchlist,
        preferences,
        mode_store,
        Arc::new(SystemClock),
        command_tx,
    );

    // Stand-in for the hosting application's presentation layer.
    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            info!(
                title = %command.title,
                body = %command.body,
                severity = ?command.severity,
                "Notification"
            );
        }
    });

    if args.live {
        app.enter_live()?;
    } else {
        app.restore_mode()?;
    }

    app.run().await?;
    Ok(())
}
