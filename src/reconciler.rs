use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::platform::{Channel, MessageHandle, PlatformError, StatusPlatform};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("chat {0} not found or no longer accessible")]
    ChannelUnavailable(i64),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// What a successful reconcile did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// No message was tracked, so a new one was posted.
    Sent(MessageHandle),
    /// The tracked message was edited in place.
    Edited(MessageHandle),
    /// The tracked message had been deleted and was replaced.
    Replaced(MessageHandle),
}

impl Reconciled {
    pub fn handle(&self) -> MessageHandle {
        match self {
            Self::Sent(h) | Self::Edited(h) | Self::Replaced(h) => *h,
        }
    }
}

/// Keeps a single status message in sync with the latest payload.
///
/// The reconciler is the only owner of the tracked message. It is not
/// persisted, so a fresh reconciler always starts by posting a new message.
pub struct Reconciler {
    platform: Arc<dyn StatusPlatform>,
    tracked: Option<MessageHandle>,
}

impl Reconciler {
    pub fn new(platform: Arc<dyn StatusPlatform>) -> Self {
        Self {
            platform,
            tracked: None,
        }
    }

    #[cfg(test)]
    pub fn tracked(&self) -> Option<MessageHandle> {
        self.tracked
    }

    /// Resolve the configured chat, failing with `ChannelUnavailable` if it
    /// is gone. Transport errors are passed through as platform errors.
    pub async fn resolve_channel(&self, chat_id: i64) -> Result<Channel, ReconcileError> {
        self.platform
            .resolve_channel(chat_id)
            .await?
            .ok_or(ReconcileError::ChannelUnavailable(chat_id))
    }

    /// Make the status message show `text`, posting or editing as needed.
    ///
    /// A tracked message that has been deleted is replaced within the same
    /// call. Any other failure leaves the tracked message untouched.
    pub async fn reconcile(
        &mut self,
        channel: &Channel,
        text: &str,
    ) -> Result<Reconciled, ReconcileError> {
        let Some(handle) = self.tracked else {
            let handle = self.platform.send(channel, text).await?;
            info!("Initial status message sent with id {}", handle.message_id);
            self.tracked = Some(handle);
            return Ok(Reconciled::Sent(handle));
        };

        match self.platform.edit(&handle, text).await {
            Ok(()) => {
                info!("Status message {} updated", handle.message_id);
                Ok(Reconciled::Edited(handle))
            }
            Err(PlatformError::MessageNotFound(_)) => {
                warn!(
                    "Status message {} not found, it was likely deleted. Sending a new one",
                    handle.message_id
                );
                self.tracked = None;
                let replacement = self.platform.send(channel, text).await?;
                info!("Replacement status message sent with id {}", replacement.message_id);
                self.tracked = Some(replacement);
                Ok(Reconciled::Replaced(replacement))
            }
            Err(e) => Err(e.into()),
        }
    }
}
