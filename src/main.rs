use anyhow::{bail, Context, Result};
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;

use feedrelay::config::Config;
use feedrelay::feed::HttpFetcher;
use feedrelay::notify::TelegramNotifier;
use feedrelay::poller::Manager;
use feedrelay::stats::{Stats, StatsNotifier};
use feedrelay::store::SeenStore;

#[derive(Parser, Debug)]
#[command(
    name = "feedrelay",
    about = "Polls RSS/Atom feeds and relays keyword matches to Telegram"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory for the seen store and statistics
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    config.validate().context("invalid configuration")?;

    let token = config
        .telegram
        .resolve_token()
        .context("no bot token: set telegram.bot_token or FEEDRELAY_BOT_TOKEN")?;
    if config.telegram.users.is_empty() && config.telegram.channels.is_empty() {
        bail!("no delivery targets: configure telegram.users and/or telegram.channels");
    }

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory {}", args.data_dir.display())
    })?;
    let store = Arc::new(
        SeenStore::open(&args.data_dir.join("seen.txt")).context("failed to open seen store")?,
    );
    let stats = Arc::new(Stats::open(&args.data_dir.join("stats.toml")));

    let client = reqwest::Client::new();
    let telegram = Arc::new(TelegramNotifier::new(
        client.clone(),
        SecretString::from(token),
        config.telegram.api_url.as_deref(),
        &config.telegram.users,
        &config.telegram.channels,
    ));
    let notifier = Arc::new(StatsNotifier::new(telegram, stats.clone()));
    let fetcher = Arc::new(HttpFetcher::new(client, config.settings.fetch_timeout()));

    let manager = Arc::new(Manager::new(fetcher, store.clone(), notifier));
    manager.start(config.feeds.clone()).await?;

    let (sent_today, sent_total) = stats.snapshot();
    tracing::info!(
        groups = config.feeds.len(),
        seen_keys = store.len(),
        sent_today,
        sent_total,
        "feedrelay running"
    );

    let watcher = tokio::spawn(watch_config(args.config.clone(), config, manager.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    watcher.abort();
    manager.shutdown().await;
    Ok(())
}

/// Periodic configuration reconciliation.
///
/// Reloads the config file on a fixed cadence and applies the feed section
/// when the snapshot changed. A file that is missing, unparseable, or fails
/// validation leaves the previous configuration active. Only the feed groups
/// are applied live; Telegram settings require a restart.
async fn watch_config(path: PathBuf, mut current: Config, manager: Arc<Manager>) {
    loop {
        tokio::time::sleep(current.settings.config_poll_interval()).await;

        let new = match Config::load(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config reload failed, keeping previous");
                continue;
            }
        };

        if new == current {
            continue;
        }
        tracing::info!(path = %path.display(), "Configuration change detected");

        if new.telegram != current.telegram {
            tracing::warn!("Telegram settings changed; a restart is required to apply them");
        }

        match manager.update_feeds(new.feeds.clone()).await {
            Ok(summary) => {
                tracing::info!(
                    started = summary.started,
                    stopped = summary.stopped,
                    reconfigured = summary.reconfigured,
                    "Feed configuration updated"
                );
                current = new;
            }
            Err(e) => {
                tracing::warn!(error = %e, "New configuration rejected, keeping previous");
            }
        }
    }
}
