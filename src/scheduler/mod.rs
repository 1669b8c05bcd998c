pub mod tasks;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Whether a repeating job wants to keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Wrapper around tokio-cron-scheduler for background tasks
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    /// Create a new scheduler
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Add a job that runs every `period` until it returns [`TickOutcome::Stop`],
    /// at which point it removes itself. There is no backoff: a failed run is
    /// simply retried on the next period.
    pub async fn add_interval_job<F>(&self, name: &str, period: Duration, task: F) -> Result<Uuid>
    where
        F: Fn() -> Pin<Box<dyn Future<Output = TickOutcome> + Send>> + Send + Sync + 'static,
    {
        let job_name = name.to_string();
        let job = Job::new_repeated_async(period, move |uuid, scheduler| {
            let name = job_name.clone();
            let fut = task();
            Box::pin(async move {
                debug!("Running scheduled task: {}", name);
                if fut.await == TickOutcome::Stop {
                    match scheduler.remove(&uuid).await {
                        Ok(()) => info!("Scheduled task '{}' stopped", name),
                        Err(e) => error!("Failed to remove scheduled task '{}': {:?}", name, e),
                    }
                }
            })
        })
        .with_context(|| format!("Failed to create interval job: {}", name))?;

        let id = self
            .inner
            .add(job)
            .await
            .with_context(|| format!("Failed to add job: {}", name))?;

        info!("Scheduled task '{}' every {:?}", name, period);
        Ok(id)
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to shutdown scheduler")?;
        info!("Scheduler stopped");
        Ok(())
    }
}
