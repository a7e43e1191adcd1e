use std::collections::HashSet;

use tracing::{debug, warn};

use super::engine::{Engine, EngineError};
use super::events::Subscription;
use crate::core::Job;

/// Client-side cache of the engine's job list.
///
/// The snapshot is replaced wholesale on every successful fetch and kept as
/// is when a fetch fails.
#[derive(Debug, Default)]
pub struct QueueStore {
    jobs: Vec<Job>,
    last_error: Option<String>,
    subscription: Subscription,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Error from the most recent fetch, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn refresh(&mut self, engine: &dyn Engine) -> bool {
        let result = engine.get_queue().await;
        self.apply(result)
    }

    /// Install the outcome of a `get_queue` call. Returns whether the
    /// snapshot was replaced.
    pub fn apply(&mut self, result: Result<Vec<Job>, EngineError>) -> bool {
        match result {
            Ok(jobs) => {
                self.jobs = dedupe(jobs);
                self.last_error = None;
                debug!(jobs = self.jobs.len(), "Queue refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Queue refresh failed, keeping previous snapshot");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Call `handler` whenever the engine reports a queue change. Replaces any
    /// previous subscription.
    pub async fn subscribe_to_changes<F>(
        &mut self,
        engine: &dyn Engine,
        handler: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut() + Send + 'static,
    {
        self.subscription.unsubscribe();
        self.subscription = Subscription::connect(engine, handler).await?;
        Ok(())
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn unsubscribe(&mut self) {
        self.subscription.unsubscribe();
    }
}

fn dedupe(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::with_capacity(jobs.len());
    jobs.into_iter()
        .filter(|job| {
            let fresh = seen.insert(job.id.clone());
            if !fresh {
                warn!(id = %job.id, "Dropping duplicate job from snapshot");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeEngine, job};
    use crate::core::JobStatus;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_refresh_replaces_instead_of_merging() {
        let engine = FakeEngine::new();
        let mut store = QueueStore::new();

        engine.set_queue(vec![job("1", JobStatus::downloading(Some(42.0)))]);
        store.refresh(&engine).await;
        assert_eq!(store.get("1").unwrap().status.label(), "Downloading 42%");

        let mut done = job("1", JobStatus::Completed);
        done.install_path = Some("/x".into());
        engine.set_queue(vec![done.clone()]);
        store.refresh(&engine).await;

        assert_eq!(store.jobs(), &[done]);
        assert_eq!(store.get("1").unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let engine = FakeEngine::new();
        let mut store = QueueStore::new();
        engine.set_queue(vec![job("1", JobStatus::Pending), job("2", JobStatus::Completed)]);
        assert!(store.refresh(&engine).await);

        engine.fail_reads(true);
        assert!(!store.refresh(&engine).await);

        assert_eq!(store.jobs().len(), 2);
        assert!(store.last_error().unwrap().contains("unreachable"));

        engine.fail_reads(false);
        store.refresh(&engine).await;
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_ids_are_unique_in_snapshot() {
        let mut store = QueueStore::new();
        store.apply(Ok(vec![
            job("1", JobStatus::Pending),
            job("2", JobStatus::Pending),
            job("1", JobStatus::Completed),
        ]));

        let ids: Vec<_> = store.jobs().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(store.get("1").unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_last_applied_result_wins() {
        let mut store = QueueStore::new();
        let older = Ok(vec![job("1", JobStatus::Pending)]);
        let newer = Ok(vec![job("1", JobStatus::Completed)]);

        // Responses may land out of issue order; the later arrival stands.
        store.apply(newer);
        store.apply(older);

        assert_eq!(store.get("1").unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_change_notification_drives_refresh() {
        let engine = FakeEngine::new();
        let mut store = QueueStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        store
            .subscribe_to_changes(&engine, move || {
                let _ = tx.send(());
            })
            .await
            .unwrap();
        assert!(store.is_subscribed());

        engine.add_download("740", "App 740").await.unwrap();
        assert!(store.jobs().is_empty());

        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        store.refresh(&engine).await;

        assert_eq!(store.jobs().len(), 1);
        assert_eq!(store.jobs()[0].content_id, "740");
    }

    #[tokio::test]
    async fn test_unsubscribe_without_subscription() {
        let mut store = QueueStore::new();
        store.unsubscribe();
        store.unsubscribe();
        assert!(!store.is_subscribed());
    }

    #[tokio::test]
    async fn test_failed_subscribe_leaves_store_usable() {
        let engine = FakeEngine::new();
        engine.fail_reads(true);
        let mut store = QueueStore::new();

        assert!(store.subscribe_to_changes(&engine, || {}).await.is_err());
        assert!(!store.is_subscribed());
        store.unsubscribe();
    }
}
