mod bot;
mod command;
mod config;
mod handlers;
mod message_log;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harubot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path);

    let token_path = config.token_file();
    let token = config::load_token(&token_path)
        .with_context(|| format!("Cannot start without a bot token ({})", token_path.display()))?;

    info!("  Message log: {}", config.log_path().display());
    info!("  Message log limit: {}", config.log_msg_limit());
    info!("  Welcome channel: {:?}", config.welcome_channel_id());

    let bot = Arc::new(Bot::new(config));

    info!("Bot is starting...");
    let result = platform::discord::run(Arc::clone(&bot), &token).await;

    // Anything still buffered would otherwise be lost.
    match bot.flush_log().await {
        Ok(n) => info!("Flushed {} buffered message(s) on shutdown", n),
        Err(e) => error!("Final message log flush failed: {:#}", e),
    }

    result
}
