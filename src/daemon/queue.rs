//! Authoritative in-memory download queue.
//!
//! Every mutation broadcasts a payload-free change signal. Clients treat that
//! signal as "your snapshot is stale" and re-read the whole queue.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Notify, RwLock, broadcast};
use uuid::Uuid;

use crate::core::{Job, JobStatus};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Shared handle to the engine's job list.
#[derive(Clone)]
pub struct QueueManager {
    jobs: Arc<RwLock<Vec<Job>>>,
    changes: broadcast::Sender<()>,
    work: Arc<Notify>,
    keep_finished: usize,
}

impl QueueManager {
    pub fn new(keep_finished: usize) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            changes,
            work: Arc::new(Notify::new()),
            keep_finished,
        }
    }

    /// Append a pending job and wake the worker. Returns the new job id.
    pub async fn add(&self, content_id: String, display_name: String) -> String {
        let id = Uuid::now_v7().to_string();
        {
            let mut jobs = self.jobs.write().await;
            jobs.push(Job {
                id: id.clone(),
                content_id,
                display_name,
                status: JobStatus::Pending,
                install_path: None,
                created_at: Utc::now(),
            });
        }
        self.work.notify_one();
        self.notify_changed();
        id
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Move the oldest pending job to `Downloading` and hand it out.
    pub async fn claim_next(&self) -> Option<Job> {
        let claimed = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .iter_mut()
                .find(|j| matches!(j.status, JobStatus::Pending))?;
            job.status = JobStatus::downloading(Some(0.0));
            job.clone()
        };
        self.notify_changed();
        Some(claimed)
    }

    pub async fn set_progress(&self, id: &str, progress: f32) {
        let updated = {
            let mut jobs = self.jobs.write().await;
            match jobs.iter_mut().find(|j| j.id == id) {
                Some(job) if matches!(job.status, JobStatus::Downloading { .. }) => {
                    job.status = JobStatus::downloading(Some(progress));
                    true
                }
                _ => false,
            }
        };
        if updated {
            self.notify_changed();
        }
    }

    /// Record the outcome of a download and retire old finished jobs.
    ///
    /// `Ok` carries the install path.
    pub async fn finish(&self, id: &str, result: Result<String, String>) -> Option<Job> {
        let finished = {
            let mut jobs = self.jobs.write().await;
            let job = jobs.iter_mut().find(|j| j.id == id)?;
            match result {
                Ok(path) => {
                    job.status = JobStatus::Completed;
                    job.install_path = Some(path);
                }
                Err(log) => job.status = JobStatus::failed(log),
            }
            let finished = job.clone();
            retire_finished(&mut jobs, self.keep_finished);
            finished
        };
        self.notify_changed();
        Some(finished)
    }

    /// Receive a unit message after every queue mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    /// Wait until new work may be available.
    pub async fn wait_for_work(&self) {
        self.work.notified().await
    }

    fn notify_changed(&self) {
        // No subscribers is fine
        let _ = self.changes.send(());
    }
}

/// Drop the oldest terminal jobs so that at most `keep` remain.
fn retire_finished(jobs: &mut Vec<Job>, keep: usize) {
    let finished = jobs.iter().filter(|j| j.status.is_terminal()).count();
    let mut excess = finished.saturating_sub(keep);
    jobs.retain(|j| {
        if excess > 0 && j.status.is_terminal() {
            excess -= 1;
            false
        } else {
            true
        }
    });
}
