use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Last known forwarding state of a submission. `done` and `total` count images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ForwardStatus {
    Queued,
    Forwarding {
        done: usize,
        total: usize,
    },
    Retrying {
        attempt: u32,
        done: usize,
        total: usize,
        error: String,
    },
    Delivered,
    Failed {
        error: String,
    },
}

impl ForwardStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ForwardStatus::Delivered | ForwardStatus::Failed { .. })
    }
}

/// Progress of every job forwarding one submission.
///
/// A client sending per image posts one request per photo under the same
/// submission id, so a submission is only delivered once all of its images are.
#[derive(Debug, Clone, Default)]
struct SubmissionProgress {
    total: usize,
    delivered: usize,
    /// Jobs queued or running.
    open_jobs: usize,
    started: bool,
    retry: Option<(u32, String)>,
    failure: Option<String>,
}

impl SubmissionProgress {
    fn status(&self) -> ForwardStatus {
        if let Some(error) = &self.failure {
            return ForwardStatus::Failed {
                error: error.clone(),
            };
        }

        let forwarding = ForwardStatus::Forwarding {
            done: self.delivered,
            total: self.total,
        };
        if self.open_jobs > 0 {
            return match &self.retry {
                Some((attempt, error)) => ForwardStatus::Retrying {
                    attempt: *attempt,
                    done: self.delivered,
                    total: self.total,
                    error: error.clone(),
                },
                None if !self.started => ForwardStatus::Queued,
                None => forwarding,
            };
        }

        if self.delivered >= self.total {
            ForwardStatus::Delivered
        } else {
            // Waiting for the client to post the remaining images.
            forwarding
        }
    }
}

/// Bounded, shared map of submission id to forwarding progress. Oldest entries are evicted.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<Mutex<LruCache<Uuid, SubmissionProgress>>>,
}

impl StatusStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut SubmissionProgress)) {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(progress) = cache.get_mut(&id) {
            f(progress);
            return;
        }
        let mut progress = SubmissionProgress::default();
        f(&mut progress);
        cache.put(id, progress);
    }

    /// A job for `id` entered the queue. `submission_images` is the size of the whole
    /// submission; `already_delivered` counts images a replayed job sent before.
    pub fn job_queued(&self, id: Uuid, submission_images: usize, already_delivered: usize) {
        self.update(id, |p| {
            p.total = p.total.max(submission_images);
            p.delivered += already_delivered;
            p.open_jobs += 1;
        });
    }

    pub fn job_started(&self, id: Uuid) {
        self.update(id, |p| p.started = true);
    }

    pub fn images_delivered(&self, id: Uuid, images: usize) {
        self.update(id, |p| {
            p.delivered += images;
            p.retry = None;
        });
    }

    pub fn job_retrying(&self, id: Uuid, attempt: u32, error: String) {
        self.update(id, |p| p.retry = Some((attempt, error)));
    }

    pub fn job_delivered(&self, id: Uuid) {
        self.update(id, |p| {
            p.open_jobs = p.open_jobs.saturating_sub(1);
            p.retry = None;
        });
    }

    /// A job was dead-lettered. The submission stays failed.
    pub fn job_failed(&self, id: Uuid, error: String) {
        self.update(id, |p| {
            p.open_jobs = p.open_jobs.saturating_sub(1);
            p.retry = None;
            p.failure = Some(error);
        });
    }

    pub fn get(&self, id: &Uuid) -> Option<ForwardStatus> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(id).map(SubmissionProgress::status)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
