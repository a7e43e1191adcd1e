use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::fetcher::{FetchRequest, Fetcher};
use crate::context::AppContext;
use crate::core::{HistoryRecord, Job};
use crate::db;
use crate::logging::LogThrottle;

/// Drains the queue one job at a time.
pub struct Worker {
    ctx: AppContext,
    fetcher: Arc<dyn Fetcher>,
}

impl Worker {
    pub fn new(ctx: AppContext, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { ctx, fetcher }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("Download worker started");

        loop {
            match self.ctx.queue.claim_next().await {
                Some(job) => {
                    tokio::select! {
                        _ = self.process(job) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.ctx.queue.wait_for_work() => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }

        info!("Download worker stopped");
    }

    async fn process(&self, job: Job) {
        info!(job_id = %job.id, content_id = %job.content_id, "Download started");

        let req = FetchRequest {
            job_id: job.id.clone(),
            content_id: job.content_id.clone(),
            display_name: job.display_name.clone(),
            download_directory: self.ctx.config.download_directory.clone(),
        };

        let (tx, mut rx) = mpsc::channel(32);
        let fetch = self.fetcher.fetch(&req, tx);
        tokio::pin!(fetch);

        let throttle = LogThrottle::new(Duration::from_secs(1));
        let result = loop {
            tokio::select! {
                result = &mut fetch => break result,
                Some(progress) = rx.recv() => {
                    self.ctx.queue.set_progress(&job.id, progress).await;
                    if throttle.should_log() {
                        debug!(job_id = %job.id, progress, "Download progress");
                    }
                }
            }
        };

        match result {
            Ok(path) => {
                let install_path = path.to_string_lossy().to_string();
                self.archive(&job, &install_path).await;
                self.ctx.queue.finish(&job.id, Ok(install_path)).await;
                info!(job_id = %job.id, path = %path.display(), "Download completed");
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Download failed");
                self.ctx.queue.finish(&job.id, Err(format!("{:#}", e))).await;
            }
        }
    }

    async fn archive(&self, job: &Job, install_path: &str) {
        let record = HistoryRecord {
            id: Uuid::now_v7().to_string(),
            content_id: job.content_id.clone(),
            display_name: job.display_name.clone(),
            install_path: install_path.to_string(),
            timestamp: Utc::now(),
        };

        if let Err(e) = db::history::insert(&self.ctx.db, record).await {
            error!(job_id = %job.id, error = %e, "Failed to archive completed job");
        }
    }
}
