use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::minecraft::{ServerAddress, StatusLookup};
use crate::platform::StatusPlatform;
use crate::reconciler::{ReconcileError, Reconciler};
use crate::scheduler::{Scheduler, TickOutcome};
use crate::status::{format_status, probe};

/// The periodic "probe the server, refresh the message" job.
///
/// Ticks never overlap: the reconciler lives behind a mutex and a tick that
/// finds it held is skipped.
pub struct StatusTask {
    chat_id: i64,
    address: ServerAddress,
    lookup: Arc<dyn StatusLookup>,
    reconciler: Mutex<Reconciler>,
    stopped: AtomicBool,
}

impl StatusTask {
    pub fn new(
        chat_id: i64,
        address: ServerAddress,
        lookup: Arc<dyn StatusLookup>,
        platform: Arc<dyn StatusPlatform>,
    ) -> Self {
        Self {
            chat_id,
            address,
            lookup,
            reconciler: Mutex::new(Reconciler::new(platform)),
            stopped: AtomicBool::new(false),
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        if self.stopped.load(Ordering::SeqCst) {
            return TickOutcome::Stop;
        }
        let Ok(mut reconciler) = self.reconciler.try_lock() else {
            debug!("Previous status update still running, skipping tick");
            return TickOutcome::Continue;
        };
        // A tick that held the lock may have stopped the task meanwhile.
        if self.stopped.load(Ordering::SeqCst) {
            return TickOutcome::Stop;
        }

        let channel = match reconciler.resolve_channel(self.chat_id).await {
            Ok(channel) => channel,
            Err(ReconcileError::ChannelUnavailable(chat_id)) => {
                error!(
                    "Chat {} not found or inaccessible. Stopping status updates.",
                    chat_id
                );
                self.stopped.store(true, Ordering::SeqCst);
                return TickOutcome::Stop;
            }
            Err(e) => {
                warn!("Failed to look up chat {}: {}", self.chat_id, e);
                return TickOutcome::Continue;
            }
        };

        let status = probe(self.lookup.as_ref(), &self.address).await;
        let text = format_status(&status, &self.address);

        match reconciler.reconcile(&channel, &text).await {
            Ok(outcome) => debug!(
                "Chat {} shows status message {}",
                self.chat_id,
                outcome.handle().message_id
            ),
            Err(e) => error!("Failed to update status message: {}", e),
        }
        TickOutcome::Continue
    }
}

/// Run the first update straight away, then hand the task to the scheduler.
pub async fn register_status_task(
    scheduler: &Scheduler,
    task: Arc<StatusTask>,
    period: Duration,
) -> anyhow::Result<()> {
    if task.tick().await == TickOutcome::Stop {
        return Ok(());
    }

    scheduler
        .add_interval_job("status-update", period, move || {
            let task = task.clone();
            Box::pin(async move { task.tick().await })
        })
        .await?;

    Ok(())
}
