pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

/// A chat the bot is able to post into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub chat_id: i64,
}

/// Identifies a message previously posted by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The message being edited no longer exists.
    #[error("message {0:?} not found")]
    MessageNotFound(MessageHandle),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The operations the status board needs from a messaging platform.
#[async_trait]
pub trait StatusPlatform: Send + Sync {
    /// Look up a chat by id. `Ok(None)` means the chat does not exist or the
    /// bot can no longer see it.
    async fn resolve_channel(&self, chat_id: i64) -> Result<Option<Channel>, PlatformError>;

    async fn send(&self, channel: &Channel, text: &str) -> Result<MessageHandle, PlatformError>;

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), PlatformError>;
}
