//! Pool Watch Bot
//!
//! Polls the pool listing API and sends Telegram alerts for new pools that
//! match each user's TVL and fee thresholds.

mod config;

use clap::Parser;
use config::{AppConfig, RuntimeSettings};
use poolwatch_alerts::{AlertSink, Command, CycleReport, Database, Notifier, SettingsStore, TelegramBot};
use poolwatch_feeds::{PoolClient, PoolSource};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Pool Watch Bot CLI
#[derive(Parser, Debug)]
#[command(name = "poolwatch-bot")]
#[command(about = "Telegram alerts for new liquidity pools", long_about = None)]
struct Args {
    /// Seconds between background pool checks for the configured chat (0 disables)
    #[arg(short, long, default_value_t = 60)]
    poll_interval_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10)]
    request_timeout_secs: u64,

    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

async fn run_poll_loop(notifier: Arc<Notifier>, chat_id: i64, interval: Duration) {
    info!(chat_id = chat_id, interval_secs = interval.as_secs(), "Starting poll loop");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match notifier.track_new_pools(chat_id).await {
            Ok(CycleReport::Skipped) => debug!("Poll skipped"),
            Ok(report) => debug!(?report, "Poll complete"),
            Err(e) => error!(error = %e, "Poll failed"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let runtime = RuntimeSettings {
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        database_url: args.database_url.clone(),
    };
    let config = match AppConfig::from_env(runtime) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("🚀 Pool Watch Bot starting...");
    info!("  Chat: {}", config.chat_id);
    info!("  Database: {}", config.database_url);
    info!("  Pools API: {}", config.client.pools_api_url);
    info!("  Poll interval: {:?}", config.poll_interval);

    let db = match Database::connect(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let client = match PoolClient::new(&config.client) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create pool client: {}", e);
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.bot_token);
    let store: Arc<dyn SettingsStore> = Arc::new(db);
    let source: Arc<dyn PoolSource> = Arc::new(client);
    let sink: Arc<dyn AlertSink> = Arc::new(bot.clone());
    let notifier = Arc::new(Notifier::new(source, store.clone(), sink));

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }
    if let Err(e) = bot
        .send_message(ChatId(config.chat_id), "✅ Pool Watch Bot started")
        .await
    {
        warn!("Failed to send startup message: {}", e);
    }

    let poll_handle = if config.polling_enabled() {
        let poll_notifier = notifier.clone();
        let chat_id = config.chat_id;
        let interval = config.poll_interval;
        Some(tokio::spawn(async move {
            run_poll_loop(poll_notifier, chat_id, interval).await;
        }))
    } else {
        info!("Background polling disabled");
        None
    };

    // Runs until Ctrl+C
    let telegram = Arc::new(TelegramBot::new(bot, store, notifier));
    telegram.run().await;

    warn!("Shutdown signal received");
    if let Some(handle) = poll_handle {
        handle.abort();
    }

    info!("👋 Pool Watch Bot stopped");
}
