//! Bridge from the engine's "queue changed" channel to a local handler.

use tokio::task::JoinHandle;
use tracing::debug;

use super::engine::{ChangeFeed, Engine, EngineError};

/// Live subscription to the change channel.
///
/// The handler runs once per notification on a background task. Bursts are
/// not deduplicated; the refresh they trigger is idempotent.
#[derive(Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Open the engine's change channel and start forwarding it to `handler`.
    pub async fn connect<F>(engine: &dyn Engine, handler: F) -> Result<Self, EngineError>
    where
        F: FnMut() + Send + 'static,
    {
        let feed = engine.subscribe_changes().await?;
        Ok(Self::spawn(feed, handler))
    }

    pub fn spawn<F>(mut feed: ChangeFeed, mut handler: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while feed.changed().await {
                handler();
            }
            debug!("Change feed closed");
        });
        Self { task: Some(task) }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop forwarding. Safe to call repeatedly or on a subscription that was
    /// never connected.
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Unsubscribed from queue changes");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_handler_runs_per_notification() {
        let (tx, rx) = mpsc::channel(8);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let _sub = Subscription::spawn(ChangeFeed::new(rx, None), move || {
            let _ = seen_tx.send(());
        });

        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let mut never = Subscription::default();
        never.unsubscribe();
        never.unsubscribe();
        assert!(!never.is_active());

        let (_tx, rx) = mpsc::channel(1);
        let mut sub = Subscription::spawn(ChangeFeed::new(rx, None), || {});
        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_feed_close_ends_subscription() {
        let (tx, rx) = mpsc::channel(1);
        let sub = Subscription::spawn(ChangeFeed::new(rx, None), || {});
        drop(tx);

        for _ in 0..50 {
            if !sub.is_active() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscription still active after feed closed");
    }
}
