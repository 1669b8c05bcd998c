use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

use crate::platform::{Channel, MessageHandle, PlatformError, StatusPlatform};

/// Telegram binding for the status board, talking to the Bot API.
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    /// Authenticate with the Bot API. Returns once `getMe` has succeeded,
    /// which is the point where the bot is ready to post.
    pub async fn connect(token: &str) -> Result<Self> {
        let bot = Bot::new(token);
        let me = bot
            .get_me()
            .await
            .context("Telegram rejected the bot token")?;
        info!("Logged in as @{}", me.username());
        Ok(Self { bot })
    }
}

fn other(err: RequestError, action: &str) -> PlatformError {
    PlatformError::Other(anyhow::Error::new(err).context(action.to_string()))
}

/// Chats the bot was removed from resolve to `None`, like missing ones.
fn classify_chat<T>(
    result: Result<T, RequestError>,
    chat_id: i64,
) -> Result<Option<Channel>, PlatformError> {
    match result {
        Ok(_) => Ok(Some(Channel { chat_id })),
        Err(RequestError::Api(
            ApiError::ChatNotFound
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::BotKickedFromChannel,
        )) => Ok(None),
        Err(e) => Err(other(e, "Failed to look up chat")),
    }
}

fn classify_edit<T>(
    result: Result<T, RequestError>,
    handle: &MessageHandle,
) -> Result<(), PlatformError> {
    match result {
        Ok(_) => Ok(()),
        // Telegram refuses edits that would leave the text unchanged.
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!("Message {} already up to date", handle.message_id);
            Ok(())
        }
        Err(RequestError::Api(ApiError::MessageToEditNotFound | ApiError::MessageIdInvalid)) => {
            Err(PlatformError::MessageNotFound(*handle))
        }
        Err(e) => Err(other(e, "Failed to edit message")),
    }
}

#[async_trait]
impl StatusPlatform for TelegramPlatform {
    async fn resolve_channel(&self, chat_id: i64) -> Result<Option<Channel>, PlatformError> {
        classify_chat(self.bot.get_chat(ChatId(chat_id)).await, chat_id)
    }

    async fn send(&self, channel: &Channel, text: &str) -> Result<MessageHandle, PlatformError> {
        let message = self
            .bot
            .send_message(ChatId(channel.chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| {
                if let RequestError::MigrateToChatId(new_id) = &e {
                    warn!(
                        "Chat {} was upgraded to supergroup {:?}; update TELEGRAM_CHAT_ID",
                        channel.chat_id, new_id
                    );
                }
                other(e, "Failed to send message")
            })?;

        Ok(MessageHandle {
            chat_id: message.chat.id.0,
            message_id: message.id.0,
        })
    }

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), PlatformError> {
        let result = self
            .bot
            .edit_message_text(ChatId(handle.chat_id), MessageId(handle.message_id), text)
            .parse_mode(ParseMode::Html)
            .await;

        classify_edit(result, handle)
    }
}
