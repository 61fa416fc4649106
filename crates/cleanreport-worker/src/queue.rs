//! Forward queue: bounded channel, worker pool, pacing, retry and dead-lettering.
//!
//! The relay's upload handler calls [`ForwardQueue::submit`], which persists the job
//! and enqueues it without awaiting the sink. Workers forward each job's units
//! sequentially with a pace delay after every delivered unit; distinct jobs run
//! concurrently up to `max_concurrent`.

use std::sync::Arc;
use std::time::Duration;

use cleanreport_core::{AppError, Config, ForwardMode, TransferPayload};
use cleanreport_storage::{Sink, SinkError};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use crate::outbox::{ForwardJob, Outbox, OutboxError};
use crate::status::{ForwardStatus, StatusStore};

/// Maximum delay in seconds before retrying a failed job. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64
        .checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Sink call timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

impl ForwardError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ForwardError::Sink(e) => e.is_retryable(),
            ForwardError::Timeout(_) => true,
            ForwardError::Outbox(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForwardQueueConfig {
    pub mode: ForwardMode,
    /// Delay after each delivered unit.
    pub pace: Duration,
    pub queue_size: usize,
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub sink_timeout: Duration,
    /// Multiplied by the exponential backoff factor between retries.
    pub backoff_unit: Duration,
}

impl Default for ForwardQueueConfig {
    fn default() -> Self {
        Self {
            mode: ForwardMode::PerImage,
            pace: Duration::from_millis(1000),
            queue_size: 1000,
            max_concurrent: 1,
            max_retries: 3,
            sink_timeout: Duration::from_secs(60),
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl ForwardQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.forward_mode(),
            pace: Duration::from_millis(config.forward_pace_ms()),
            queue_size: config.forward_queue_size(),
            max_concurrent: config.forward_max_concurrent(),
            max_retries: config.forward_max_retries(),
            sink_timeout: Duration::from_secs(config.sink_timeout_secs()),
            ..Self::default()
        }
    }
}

/// Shared by every worker task.
struct WorkerContext {
    sink: Arc<dyn Sink>,
    outbox: Arc<dyn Outbox>,
    statuses: StatusStore,
    config: ForwardQueueConfig,
}

pub struct ForwardQueue {
    tx: mpsc::Sender<ForwardJob>,
    outbox: Arc<dyn Outbox>,
    statuses: StatusStore,
    config: ForwardQueueConfig,
    /// Held by worker-less queues so the channel reports Full rather than Closed.
    idle_rx: Option<Arc<mpsc::Receiver<ForwardJob>>>,
}

impl ForwardQueue {
    /// Create a forward queue and spawn its worker pool.
    ///
    /// The channel is bounded by `config.queue_size`; when it is full, `submit()`
    /// returns [`AppError::QueueFull`].
    pub fn new(
        sink: Arc<dyn Sink>,
        outbox: Arc<dyn Outbox>,
        statuses: StatusStore,
        config: ForwardQueueConfig,
    ) -> Self {
        let queue_size = config.queue_size.max(1);
        let (tx, rx) = mpsc::channel(queue_size);

        let ctx = Arc::new(WorkerContext {
            sink,
            outbox: outbox.clone(),
            statuses: statuses.clone(),
            config: config.clone(),
        });

        tokio::spawn(async move {
            Self::worker_pool(rx, ctx).await;
        });

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = config.max_concurrent,
            mode = %config.mode,
            pace_ms = config.pace.as_millis() as u64,
            "Forward queue initialized with bounded channel"
        );

        Self {
            tx,
            outbox,
            statuses,
            config,
            idle_rx: None,
        }
    }

    /// Creates a queue that does not spawn a worker.
    /// Jobs submitted here are persisted in the outbox and picked up by the next
    /// queue that replays it.
    pub fn new_no_worker(
        outbox: Arc<dyn Outbox>,
        statuses: StatusStore,
        config: ForwardQueueConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        Self {
            tx,
            outbox,
            statuses,
            config,
            idle_rx: Some(Arc::new(rx)),
        }
    }

    /// Persist and enqueue a submission. Never waits on the sink.
    #[tracing::instrument(skip(self, payload), fields(submission.id = %payload.submission_id))]
    pub async fn submit(&self, payload: TransferPayload) -> Result<Uuid, AppError> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!("Forward queue is full, rejecting submission");
                AppError::QueueFull {
                    capacity: self.config.queue_size,
                }
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Internal("Forward queue is closed".to_string())
            }
        })?;

        let job = ForwardJob::new(payload, self.config.mode);
        let id = job.id();
        let job_id = job.job_id;

        self.outbox.put(&job).await.map_err(|e| {
            tracing::error!(submission_id = %id, error = %e, "Failed to persist forward job");
            AppError::Storage(e.to_string())
        })?;

        self.statuses
            .job_queued(id, job.payload.submission_image_count(), 0);
        permit.send(job);

        tracing::info!(submission_id = %id, job_id = %job_id, "Forward job enqueued");
        Ok(id)
    }

    /// Re-enqueue every pending outbox job. Called once at startup.
    ///
    /// Jobs are sent from a background task so a backlog larger than the channel
    /// does not block startup.
    pub async fn replay_pending(&self) -> Result<usize, OutboxError> {
        let jobs = self.outbox.pending().await?;
        let count = jobs.len();
        if count == 0 {
            return Ok(0);
        }

        for job in &jobs {
            self.statuses.job_queued(
                job.id(),
                job.payload.submission_image_count(),
                job.delivered_images(),
            );
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            for job in jobs {
                let id = job.id();
                if tx.send(job).await.is_err() {
                    tracing::error!(submission_id = %id, "Forward queue closed during replay");
                    break;
                }
            }
        });

        tracing::info!(jobs = count, "Replaying pending forward jobs");
        Ok(count)
    }

    pub fn status(&self, id: &Uuid) -> Option<ForwardStatus> {
        self.statuses.get(id)
    }

    pub fn statuses(&self) -> &StatusStore {
        &self.statuses
    }

    async fn worker_pool(mut rx: mpsc::Receiver<ForwardJob>, ctx: Arc<WorkerContext>) {
        let semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent.max(1)));

        while let Some(job) = rx.recv().await {
            let permit = semaphore.clone().acquire_owned().await;
            let ctx = ctx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let id = job.id();
                if let Err(e) = Self::process_job(job, ctx).await {
                    tracing::error!(submission_id = %id, error = %e, "Forward job failed");
                }
            });
        }

        tracing::info!("Forward queue worker pool stopped");
    }

    /// Deliver the remaining units of `job`, retrying with backoff.
    #[tracing::instrument(skip(job, ctx), fields(submission.id = %job.id(), job.status = tracing::field::Empty))]
    async fn process_job(mut job: ForwardJob, ctx: Arc<WorkerContext>) -> Result<(), ForwardError> {
        let id = job.id();
        let units = job.units();
        let total = units.len();
        let start = std::time::Instant::now();

        ctx.statuses.job_started(id);

        loop {
            let failure = Self::deliver_remaining(&mut job, &units, &ctx).await.err();

            let Some(error) = failure else {
                if let Err(e) = ctx.outbox.remove(job.job_id).await {
                    tracing::warn!(submission_id = %id, error = %e, "Failed to remove delivered job from outbox");
                }
                ctx.statuses.job_delivered(id);
                tracing::Span::current().record("job.status", "delivered");
                tracing::info!(
                    submission_id = %id,
                    units = total,
                    attempts = job.attempts + 1,
                    duration_ms = start.elapsed().as_millis(),
                    "Forward job delivered"
                );
                return Ok(());
            };

            job.attempts += 1;
            job.last_error = Some(error.to_string());

            tracing::error!(
                submission_id = %id,
                error = %error,
                done = job.completed_units,
                total = total,
                attempt = job.attempts,
                max_retries = ctx.config.max_retries,
                retryable = error.is_retryable(),
                "Forward attempt failed"
            );

            if !error.is_retryable() || job.attempts > ctx.config.max_retries {
                if let Err(e) = ctx.outbox.dead_letter(&job).await {
                    tracing::error!(submission_id = %id, error = %e, "Failed to dead-letter forward job");
                }
                ctx.statuses.job_failed(id, error.to_string());
                tracing::Span::current().record("job.status", "dead_lettered");
                tracing::error!(
                    submission_id = %id,
                    attempts = job.attempts,
                    "Forward job moved to dead letter"
                );
                return Err(error);
            }

            if let Err(e) = ctx.outbox.put(&job).await {
                tracing::warn!(submission_id = %id, error = %e, "Failed to persist retry state");
            }

            let backoff = ctx
                .config
                .backoff_unit
                .saturating_mul(compute_retry_backoff_seconds(job.attempts - 1) as u32);
            ctx.statuses
                .job_retrying(id, job.attempts, error.to_string());
            tracing::info!(
                submission_id = %id,
                retry_count = job.attempts,
                backoff_ms = backoff.as_millis() as u64,
                "Scheduling forward retry"
            );
            sleep(backoff).await;
        }
    }

    async fn deliver_remaining(
        job: &mut ForwardJob,
        units: &[cleanreport_core::ForwardUnit],
        ctx: &WorkerContext,
    ) -> Result<(), ForwardError> {
        let total = units.len();

        for unit in units.iter().skip(job.completed_units) {
            match tokio::time::timeout(ctx.config.sink_timeout, ctx.sink.store(unit)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ForwardError::Timeout(ctx.config.sink_timeout.as_secs())),
            }

            job.completed_units += 1;
            ctx.statuses.images_delivered(job.id(), unit.images.len());
            if job.completed_units < total {
                ctx.outbox.put(job).await?;
            }

            tracing::debug!(
                submission_id = %job.id(),
                done = job.completed_units,
                total = total,
                "Forward unit delivered"
            );

            sleep(ctx.config.pace).await;
        }

        Ok(())
    }
}

impl Clone for ForwardQueue {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            outbox: self.outbox.clone(),
            statuses: self.statuses.clone(),
            config: self.config.clone(),
            idle_rx: self.idle_rx.clone(),
        }
    }
}
