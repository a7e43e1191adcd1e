//! Content fetchers.
//!
//! A fetcher performs the actual download for one job. The worker owns the
//! queue bookkeeping; the fetcher only reports progress and the final install
//! path.

mod simulated;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use simulated::SimulatedFetcher;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub job_id: String,
    pub content_id: String,
    pub display_name: String,
    pub download_directory: PathBuf,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download the content, sending progress percentages on `progress`.
    ///
    /// Returns the directory the content was installed to.
    async fn fetch(&self, req: &FetchRequest, progress: mpsc::Sender<f32>) -> Result<PathBuf>;
}
