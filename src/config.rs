use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::minecraft::ServerAddress;

const DEFAULT_SERVER_ADDRESS: &str = "185.55.240.150";

fn default_check_interval() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    3
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone)]
pub struct MinecraftConfig {
    pub address: ServerAddress,
    pub probe_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub minecraft: MinecraftConfig,
    pub check_interval: Duration,
}

impl Config {
    /// Load configuration from the process environment, honouring a `.env`
    /// file in the working directory if one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .context("TELEGRAM_BOT_TOKEN must be set")?;

        let raw_chat_id = lookup("TELEGRAM_CHAT_ID").context("TELEGRAM_CHAT_ID must be set")?;
        let chat_id = raw_chat_id
            .trim()
            .parse::<i64>()
            .with_context(|| format!("Invalid TELEGRAM_CHAT_ID: {raw_chat_id} (expected integer)"))?;

        let raw_address = lookup("MINECRAFT_SERVER_ADDRESS")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());
        let address: ServerAddress = raw_address
            .parse()
            .with_context(|| format!("Invalid MINECRAFT_SERVER_ADDRESS: {raw_address}"))?;

        let check_interval = parse_secs(&lookup, "CHECK_INTERVAL_SECS", default_check_interval())?;
        let probe_timeout = parse_secs(&lookup, "PROBE_TIMEOUT_SECS", default_probe_timeout())?;

        Ok(Self {
            telegram: TelegramConfig { bot_token, chat_id },
            minecraft: MinecraftConfig {
                address,
                probe_timeout,
            },
            check_interval,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid {key}: {raw} (expected whole seconds)"))?,
        None => default,
    };
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
