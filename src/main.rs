mod bot;
mod config;
mod minecraft;
mod platform;
mod reconciler;
mod scheduler;
mod status;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mcstatusbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    info!("Configuration loaded successfully");
    info!("  Minecraft server: {}", config.minecraft.address);
    info!("  Telegram chat: {}", config.telegram.chat_id);
    info!("  Check interval: {:?}", config.check_interval);
    info!("  Probe timeout: {:?}", config.minecraft.probe_timeout);

    info!("Bot is starting...");
    bot::run(config).await?;

    Ok(())
}
