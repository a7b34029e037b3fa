//! critiq-bot - Main entry point
//!
//! Startup: config → database → Telegram and assistant clients → reminder
//! restore → polling. Shutdown (Ctrl+C / SIGTERM) stops polling, lets
//! in-flight messages and open album windows finish, then stops reminders.

use anyhow::{Context, Result};
use clap::Parser;
use critiq_common::config::{load_toml_config, TomlConfig};
use critiq_common::db::init_database;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use critiq_bot::ai::OpenAiAssistant;
use critiq_bot::config::{Args, BotConfig};
use critiq_bot::dispatcher::Dispatcher;
use critiq_bot::handlers::Handlers;
use critiq_bot::notifier::DelayedNotifier;
use critiq_bot::poller::Poller;
use critiq_bot::telegram::TelegramClient;

/// Longest wait for in-flight messages on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(150);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config_path();
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load config file")?,
        None => TomlConfig::default(),
    };

    // RUST_LOG wins over the configured level
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting critiq-bot {}", critiq_bot::build_info());
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let config = BotConfig::resolve(&args, &toml_config)?;

    info!("Database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let telegram = Arc::new(TelegramClient::new(
        config.telegram_api_url.clone(),
        config.bot_token.clone(),
    )?);
    let me = telegram
        .get_me()
        .await
        .context("Failed to reach Telegram (check the bot token)")?;
    info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or_default(),
        "Connected to Telegram"
    );

    let assistant = Arc::new(OpenAiAssistant::new(config.openai_settings())?);
    info!(assistant_id = %config.assistant_id, "Assistant client ready");

    let notifier = Arc::new(DelayedNotifier::new(
        pool.clone(),
        telegram.clone(),
        CancellationToken::new(),
    ));
    notifier
        .restore_pending()
        .await
        .context("Failed to restore pending reminders")?;

    let handlers = Handlers::new(
        pool.clone(),
        telegram.clone(),
        assistant,
        notifier.clone(),
        config.handler_settings(),
    );
    let dispatcher = Arc::new(Dispatcher::new(handlers, config.album_latency));

    let tracker = TaskTracker::new();
    let stop_polling = CancellationToken::new();
    let poller = Poller::new(
        telegram,
        dispatcher.clone(),
        tracker.clone(),
        stop_polling.clone(),
        config.poll_timeout_secs,
    );
    let polling = tokio::spawn(poller.run());

    shutdown_signal().await;

    stop_polling.cancel();
    if let Err(e) = polling.await {
        error!("Poller task failed: {}", e);
    }

    tracker.close();
    info!(
        in_flight = tracker.len(),
        open_albums = dispatcher.open_albums(),
        "Waiting for in-flight messages"
    );
    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait()).await.is_err() {
        warn!("In-flight messages did not finish within {:?}", DRAIN_TIMEOUT);
    }

    notifier.shutdown().await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
