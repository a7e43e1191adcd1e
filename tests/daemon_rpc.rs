//! End-to-end tests: a real daemon on an ephemeral port, driven through the
//! client stores over JSON-RPC.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dlq::client::{
    ActionDispatcher, AddOutcome, Engine, ExistenceResolver, HistoryAction, HistoryStore,
    QueueStore, RpcEngine,
};
use dlq::config::AppConfig;
use dlq::context::AppContext;
use dlq::core::JobStatus;
use dlq::daemon::{Daemon, DaemonHandle, QueueManager, SimulatedFetcher};
use dlq::db;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

async fn start_daemon(dir: &TempDir) -> DaemonHandle {
    let config = AppConfig {
        rpc_bind: SocketAddr::from(([127, 0, 0, 1], 0)),
        download_directory: dir.path().join("downloads"),
        database_path: dir.path().join("dlq.db"),
        ..AppConfig::default()
    };
    let conn = db::init(&config.database_path).await.unwrap();
    let ctx = AppContext::new(config, conn, QueueManager::new(20));
    let fetcher = SimulatedFetcher::new(Duration::from_millis(5));

    Daemon::new(ctx, Arc::new(fetcher)).start().await.unwrap()
}

/// Refresh on every change notification until `done` holds for the snapshot.
async fn refresh_until(
    store: &mut QueueStore,
    engine: &dyn Engine,
    changes: &mut mpsc::UnboundedReceiver<()>,
    done: impl Fn(&QueueStore) -> bool,
) {
    timeout(WAIT, async {
        loop {
            store.refresh(engine).await;
            if done(&*store) {
                return;
            }
            changes.recv().await.expect("change feed closed");
        }
    })
    .await
    .expect("queue never reached the expected state");
}

#[tokio::test]
async fn test_download_lifecycle_through_stores() {
    let dir = TempDir::new().unwrap();
    let daemon = start_daemon(&dir).await;
    let engine = Arc::new(RpcEngine::new(daemon.local_addr()));
    let dispatcher = ActionDispatcher::new(engine.clone());

    let mut queue = QueueStore::new();
    let (tx, mut changes) = mpsc::unbounded_channel();
    queue
        .subscribe_to_changes(engine.as_ref(), move || {
            let _ = tx.send(());
        })
        .await
        .unwrap();

    let outcome = dispatcher.add("740", None).await.unwrap();
    assert_eq!(
        outcome,
        AddOutcome::Submitted {
            content_id: "740".into(),
            display_name: "App 740".into(),
        }
    );

    // The add only becomes visible through the change notification.
    timeout(WAIT, changes.recv()).await.unwrap().unwrap();

    refresh_until(&mut queue, engine.as_ref(), &mut changes, |q| {
        q.jobs()
            .iter()
            .any(|j| j.content_id == "740" && j.status == JobStatus::Completed)
    })
    .await;

    let job = queue.jobs().iter().find(|j| j.content_id == "740").unwrap();
    assert_eq!(job.display_name, "App 740");
    let install_path = job.install_path.clone().unwrap();

    let mut history = HistoryStore::new();
    assert!(history.fetch_all(engine.as_ref()).await);
    assert_eq!(history.records().len(), 1);
    let record = history.records()[0].clone();
    assert_eq!(record.content_id, "740");
    assert_eq!(record.install_path, install_path);

    let mut resolver = ExistenceResolver::new();
    assert_eq!(resolver.action_for(&record), HistoryAction::Retry);
    for check in resolver.sync(history.records()) {
        let result = check.run(engine.as_ref()).await;
        resolver.apply(&check, result);
    }
    assert_eq!(resolver.action_for(&record), HistoryAction::Open);

    history.remove(engine.as_ref(), &record.id).await.unwrap();
    assert!(history.get(&record.id).is_none());

    queue.unsubscribe();
    daemon.shutdown().await;
}

#[tokio::test]
async fn test_failed_download_carries_log_and_is_not_archived() {
    let dir = TempDir::new().unwrap();
    let daemon = start_daemon(&dir).await;
    let engine = Arc::new(RpcEngine::new(daemon.local_addr()));

    let mut queue = QueueStore::new();
    let (tx, mut changes) = mpsc::unbounded_channel();
    queue
        .subscribe_to_changes(engine.as_ref(), move || {
            let _ = tx.send(());
        })
        .await
        .unwrap();

    ActionDispatcher::new(engine.clone())
        .add("fail-90", Some("Broken"))
        .await
        .unwrap();

    refresh_until(&mut queue, engine.as_ref(), &mut changes, |q| {
        q.jobs().iter().any(|j| j.status.failure_log().is_some())
    })
    .await;

    let log = queue.jobs()[0].status.failure_log().unwrap();
    assert!(log.contains("fail-90"));

    let mut history = HistoryStore::new();
    history.fetch_all(engine.as_ref()).await;
    assert!(history.records().is_empty());

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_retry_and_clear_history() {
    let dir = TempDir::new().unwrap();
    let daemon = start_daemon(&dir).await;
    let engine = Arc::new(RpcEngine::new(daemon.local_addr()));

    let mut queue = QueueStore::new();
    let (tx, mut changes) = mpsc::unbounded_channel();
    queue
        .subscribe_to_changes(engine.as_ref(), move || {
            let _ = tx.send(());
        })
        .await
        .unwrap();

    let dispatcher = ActionDispatcher::new(engine.clone());
    dispatcher.add("10", Some("First")).await.unwrap();
    refresh_until(&mut queue, engine.as_ref(), &mut changes, |q| {
        q.jobs().iter().any(|j| j.status == JobStatus::Completed)
    })
    .await;

    let mut history = HistoryStore::new();
    history.fetch_all(engine.as_ref()).await;
    let record = history.records()[0].clone();

    history
        .retry(engine.as_ref(), &record.content_id, &record.display_name)
        .await
        .unwrap();
    refresh_until(&mut queue, engine.as_ref(), &mut changes, |q| {
        q.jobs()
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .count()
            == 2
    })
    .await;

    history.fetch_all(engine.as_ref()).await;
    assert_eq!(history.records().len(), 2);
    assert!(history.get(&record.id).is_some());

    history.clear_all(engine.as_ref()).await.unwrap();
    assert!(history.records().is_empty());

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_filesystem_queries() {
    let dir = TempDir::new().unwrap();
    let daemon = start_daemon(&dir).await;
    let engine = RpcEngine::new(daemon.local_addr());

    assert!(!engine.check_path_exists("").await.unwrap());
    assert!(
        engine
            .check_path_exists(dir.path().to_str().unwrap())
            .await
            .unwrap()
    );
    assert!(
        !engine
            .check_path_exists(dir.path().join("missing").to_str().unwrap())
            .await
            .unwrap()
    );

    // Opening a missing folder is rejected by the daemon.
    assert!(
        engine
            .open_folder(dir.path().join("missing").to_str().unwrap())
            .await
            .is_err()
    );

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_engine_keeps_snapshots() {
    let dir = TempDir::new().unwrap();
    let daemon = start_daemon(&dir).await;
    let addr = daemon.local_addr();
    let engine = RpcEngine::new(addr);

    let mut queue = QueueStore::new();
    assert!(queue.refresh(&engine).await);
    daemon.shutdown().await;

    assert!(!queue.refresh(&engine).await);
    assert!(queue.jobs().is_empty());
    assert!(queue.last_error().is_some());

    let dispatcher = ActionDispatcher::new(Arc::new(RpcEngine::new(addr)));
    assert!(dispatcher.add("740", None).await.is_err());
}
