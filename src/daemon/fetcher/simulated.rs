use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use super::{FetchRequest, Fetcher};
use crate::core::sanitize_name;

/// Content ids with this prefix fail, to exercise the failure path.
const FAILING_PREFIX: &str = "fail";

/// Fetcher that pretends to download by sleeping through progress steps.
pub struct SimulatedFetcher {
    pub step: Duration,
    pub steps: u32,
}

impl Default for SimulatedFetcher {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(250),
            steps: 10,
        }
    }
}

impl SimulatedFetcher {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Fetcher for SimulatedFetcher {
    async fn fetch(&self, req: &FetchRequest, progress: mpsc::Sender<f32>) -> Result<PathBuf> {
        let steps = self.steps.max(1);

        for step in 1..=steps {
            sleep(self.step).await;

            if req.content_id.starts_with(FAILING_PREFIX) && step * 2 > steps {
                bail!(
                    "ERROR! Failed to install app '{}' (No subscription)",
                    req.content_id
                );
            }

            let _ = progress.send(step as f32 * 100.0 / steps as f32).await;
        }

        let install_dir = req
            .download_directory
            .join(sanitize_name(&req.display_name));
        tokio::fs::create_dir_all(&install_dir)
            .await
            .with_context(|| format!("Failed to create {}", install_dir.display()))?;
        tokio::fs::write(install_dir.join("content.txt"), &req.content_id)
            .await
            .context("Failed to write content marker")?;

        Ok(install_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_id: &str, dir: &std::path::Path) -> FetchRequest {
        FetchRequest {
            job_id: "job-1".to_string(),
            content_id: content_id.to_string(),
            display_name: "CS:GO Server".to_string(),
            download_directory: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_fetch_creates_install_directory() {
        let temp = tempfile::tempdir().unwrap();
        let fetcher = SimulatedFetcher {
            step: Duration::from_millis(1),
            steps: 4,
        };
        let (tx, mut rx) = mpsc::channel(16);

        let path = fetcher.fetch(&request("740", temp.path()), tx).await.unwrap();

        assert_eq!(path, temp.path().join("CS_GO Server"));
        assert!(path.join("content.txt").exists());

        let mut updates = Vec::new();
        while let Some(p) = rx.recv().await {
            updates.push(p);
        }
        assert_eq!(updates, [25.0, 50.0, 75.0, 100.0]);
    }

    #[tokio::test]
    async fn test_fetch_fails_for_failing_ids() {
        let temp = tempfile::tempdir().unwrap();
        let fetcher = SimulatedFetcher {
            step: Duration::from_millis(1),
            steps: 4,
        };
        let (tx, _rx) = mpsc::channel(16);

        let err = fetcher.fetch(&request("fail-1", temp.path()), tx).await.unwrap_err();

        assert!(err.to_string().contains("fail-1"));
        assert!(!temp.path().join("CS_GO Server").exists());
    }
}
