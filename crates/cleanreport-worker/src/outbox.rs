//! Forward job persistence.
//!
//! [`FileOutbox`] layout under its spool directory:
//!
//! - `pending/{jobId}.json`: jobs still to forward
//! - `dead/{jobId}.json`: jobs that exhausted their retries
//!
//! Jobs are keyed by their own id: a client forwarding per image posts several
//! requests under one submission id, and each becomes a separate job.
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a crash never
//! leaves a half-written job behind.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cleanreport_core::{ForwardMode, ForwardUnit, TransferPayload};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Outbox IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Outbox serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type OutboxResult<T> = Result<T, OutboxError>;

/// A submission waiting to be forwarded, with its delivery progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardJob {
    pub job_id: Uuid,
    pub payload: TransferPayload,
    pub mode: ForwardMode,
    /// Units `0..completed_units` have been delivered.
    pub completed_units: usize,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ForwardJob {
    pub fn new(payload: TransferPayload, mode: ForwardMode) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            payload,
            mode,
            completed_units: 0,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Submission this job forwards.
    pub fn id(&self) -> Uuid {
        self.payload.submission_id
    }

    pub fn units(&self) -> Vec<ForwardUnit> {
        self.payload.forward_units(self.mode)
    }

    pub fn total_units(&self) -> usize {
        self.units().len()
    }

    /// Images carried by the units already delivered.
    pub fn delivered_images(&self) -> usize {
        self.units()
            .iter()
            .take(self.completed_units)
            .map(|unit| unit.images.len())
            .sum()
    }
}

/// Durable store of forward jobs
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Insert or replace a pending job.
    async fn put(&self, job: &ForwardJob) -> OutboxResult<()>;

    /// Drop a pending job by `job_id`. Removing an unknown job is not an error.
    async fn remove(&self, job_id: Uuid) -> OutboxResult<()>;

    /// Move a job from pending to the dead-letter area.
    async fn dead_letter(&self, job: &ForwardJob) -> OutboxResult<()>;

    /// Pending jobs, oldest first.
    async fn pending(&self) -> OutboxResult<Vec<ForwardJob>>;

    /// Dead-lettered jobs, oldest first.
    async fn dead_letters(&self) -> OutboxResult<Vec<ForwardJob>>;
}

/// Outbox spooling one JSON file per job
pub struct FileOutbox {
    pending_dir: PathBuf,
    dead_dir: PathBuf,
}

impl FileOutbox {
    pub async fn new(dir: impl Into<PathBuf>) -> OutboxResult<Self> {
        let dir = dir.into();
        let pending_dir = dir.join("pending");
        let dead_dir = dir.join("dead");
        fs::create_dir_all(&pending_dir).await?;
        fs::create_dir_all(&dead_dir).await?;

        tracing::info!(path = %dir.display(), "File outbox initialized");

        Ok(Self {
            pending_dir,
            dead_dir,
        })
    }

    fn job_path(dir: &Path, id: Uuid) -> PathBuf {
        dir.join(format!("{}.json", id))
    }

    async fn write_atomic(path: &Path, job: &ForwardJob) -> OutboxResult<()> {
        let data = serde_json::to_vec(job)?;
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_dir_jobs(dir: &Path) -> OutboxResult<Vec<ForwardJob>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut jobs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read(&path).await?;
            match serde_json::from_slice::<ForwardJob>(&data) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable outbox entry");
                }
            }
        }

        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn remove_if_exists(path: &Path) -> OutboxResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Outbox for FileOutbox {
    async fn put(&self, job: &ForwardJob) -> OutboxResult<()> {
        Self::write_atomic(&Self::job_path(&self.pending_dir, job.job_id), job).await
    }

    async fn remove(&self, job_id: Uuid) -> OutboxResult<()> {
        Self::remove_if_exists(&Self::job_path(&self.pending_dir, job_id)).await
    }

    async fn dead_letter(&self, job: &ForwardJob) -> OutboxResult<()> {
        Self::write_atomic(&Self::job_path(&self.dead_dir, job.job_id), job).await?;
        self.remove(job.job_id).await
    }

    async fn pending(&self) -> OutboxResult<Vec<ForwardJob>> {
        Self::read_dir_jobs(&self.pending_dir).await
    }

    async fn dead_letters(&self) -> OutboxResult<Vec<ForwardJob>> {
        Self::read_dir_jobs(&self.dead_dir).await
    }
}

/// Outbox kept in process memory. Used when no spool directory is configured.
#[derive(Default)]
pub struct MemoryOutbox {
    pending: Mutex<HashMap<Uuid, ForwardJob>>,
    dead: Mutex<Vec<ForwardJob>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn put(&self, job: &ForwardJob) -> OutboxResult<()> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn remove(&self, job_id: Uuid) -> OutboxResult<()> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&job_id);
        Ok(())
    }

    async fn dead_letter(&self, job: &ForwardJob) -> OutboxResult<()> {
        self.remove(job.job_id).await?;
        let mut dead = self.dead.lock().unwrap_or_else(|e| e.into_inner());
        dead.push(job.clone());
        Ok(())
    }

    async fn pending(&self) -> OutboxResult<Vec<ForwardJob>> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<_> = pending.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn dead_letters(&self) -> OutboxResult<Vec<ForwardJob>> {
        let dead = self.dead.lock().unwrap_or_else(|e| e.into_inner());
        Ok(dead.clone())
    }
}
