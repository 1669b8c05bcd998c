use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::minecraft::JavaStatusClient;
use crate::platform::telegram::TelegramPlatform;
use crate::scheduler::tasks::{register_status_task, StatusTask};
use crate::scheduler::Scheduler;

/// Log in, start the status loop and run until the process is signalled.
pub async fn run(config: Config) -> Result<()> {
    info!("Connecting to Telegram...");
    let platform = TelegramPlatform::connect(&config.telegram.bot_token)
        .await
        .context("Failed to start Telegram session")?;

    let lookup = JavaStatusClient::new(config.minecraft.probe_timeout);
    let task = Arc::new(StatusTask::new(
        config.telegram.chat_id,
        config.minecraft.address.clone(),
        Arc::new(lookup),
        Arc::new(platform),
    ));

    let mut scheduler = Scheduler::new().await?;
    register_status_task(&scheduler, task, config.check_interval).await?;
    scheduler.start().await?;

    // The status loop may stop on its own (e.g. the chat disappeared); the
    // process stays up until it is told to exit.
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    scheduler.shutdown().await?;
    Ok(())
}
