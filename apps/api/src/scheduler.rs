use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::digest::dispatch::{DigestDispatcher, DispatchReport};
use crate::summary::{SummaryGenerator, SummaryReport};

/// Keeps at most one run of a job in flight. A trigger that arrives while
/// the previous run is still going is dropped, not queued.
pub struct JobGuard {
    name: &'static str,
    lock: Mutex<()>,
}

impl JobGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::new(()),
        }
    }

    /// `None` when the job was skipped because another run holds the guard.
    pub async fn run_exclusive<T>(&self, job: impl Future<Output = T>) -> Option<T> {
        let Ok(_running) = self.lock.try_lock() else {
            warn!(job = self.name, "previous run still in progress, skipping");
            return None;
        };
        Some(job.await)
    }
}

/// Everything the scheduled jobs need. Admin triggers use the same context
/// so a manual run and a cron run never overlap.
#[derive(Clone)]
pub struct JobContext {
    summaries: Arc<SummaryGenerator>,
    dispatcher: Arc<DigestDispatcher>,
    summary_guard: Arc<JobGuard>,
    digest_guard: Arc<JobGuard>,
}

impl JobContext {
    pub fn new(summaries: Arc<SummaryGenerator>, dispatcher: Arc<DigestDispatcher>) -> Self {
        Self {
            summaries,
            dispatcher,
            summary_guard: Arc::new(JobGuard::new("ai_summary")),
            digest_guard: Arc::new(JobGuard::new("weekly_digest")),
        }
    }

    pub fn dispatcher(&self) -> &DigestDispatcher {
        &self.dispatcher
    }

    pub async fn run_summaries(&self) -> Option<SummaryReport> {
        self.summary_guard.run_exclusive(self.summaries.run()).await
    }

    pub async fn run_digest(&self) -> Option<DispatchReport> {
        self.digest_guard
            .run_exclusive(self.dispatcher.run_weekly())
            .await
    }
}

/// The two weekly jobs: AI summaries first, the digest dispatch an hour later.
pub struct DigestScheduler {
    scheduler: JobScheduler,
}

impl DigestScheduler {
    pub async fn new(ctx: JobContext, summary_cron: &str, digest_cron: &str) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        let summary_ctx = ctx.clone();
        let summary_job = Job::new_async(summary_cron, move |_uuid, _lock| {
            let ctx = summary_ctx.clone();
            Box::pin(async move {
                info!("AI summary job triggered");
                ctx.run_summaries().await;
            })
        })
        .with_context(|| format!("invalid AI summary schedule '{summary_cron}'"))?;

        let digest_job = Job::new_async(digest_cron, move |_uuid, _lock| {
            let ctx = ctx.clone();
            Box::pin(async move {
                info!("weekly digest job triggered");
                ctx.run_digest().await;
            })
        })
        .with_context(|| format!("invalid digest schedule '{digest_cron}'"))?;

        scheduler.add(summary_job).await?;
        scheduler.add(digest_job).await?;
        info!(summary_cron, digest_cron, "weekly jobs registered");

        Ok(Self { scheduler })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        info!("scheduler started");
        Ok(())
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        info!("scheduler stopped");
        Ok(())
    }
}
