//! In-memory engine used by the client unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use super::engine::{ChangeFeed, Engine, EngineError};
use crate::core::{HistoryRecord, Job, JobStatus};

#[derive(Default)]
pub struct FakeEngine {
    queue: Mutex<Vec<Job>>,
    history: Mutex<Vec<HistoryRecord>>,
    existing_paths: Mutex<HashSet<String>>,
    subscribers: Mutex<Vec<mpsc::Sender<()>>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue(&self, jobs: Vec<Job>) {
        *self.queue.lock().unwrap() = jobs;
    }

    pub fn set_history(&self, records: Vec<HistoryRecord>) {
        *self.history.lock().unwrap() = records;
    }

    pub fn add_existing_path(&self, path: &str) {
        self.existing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every command received so far, as `name` or `name:arg:arg`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(name))
            .count()
    }

    pub fn notify_changed(&self) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| !matches!(tx.try_send(()), Err(mpsc::error::TrySendError::Closed(_))));
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn read(&self) -> Result<(), EngineError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EngineError::Unreachable("connection refused".into()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), EngineError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected("storage unavailable".into()));
        }
        Ok(())
    }

    fn enqueue(&self, content_id: &str, display_name: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.queue.lock().unwrap().push(Job {
            id,
            content_id: content_id.to_string(),
            display_name: display_name.to_string(),
            status: JobStatus::Pending,
            install_path: None,
            created_at: Utc::now(),
        });
        self.notify_changed();
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn add_download(&self, content_id: &str, display_name: &str) -> Result<(), EngineError> {
        self.record(format!("add_download:{}:{}", content_id, display_name));
        self.write()?;
        self.enqueue(content_id, display_name);
        Ok(())
    }

    async fn get_queue(&self) -> Result<Vec<Job>, EngineError> {
        self.record("get_queue".into());
        self.read()?;
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn get_history(&self) -> Result<Vec<HistoryRecord>, EngineError> {
        self.record("get_history".into());
        self.read()?;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn remove_history_item(&self, id: &str) -> Result<(), EngineError> {
        self.record(format!("remove_history_item:{}", id));
        self.write()?;
        self.history.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn clear_history(&self) -> Result<(), EngineError> {
        self.record("clear_history".into());
        self.write()?;
        self.history.lock().unwrap().clear();
        Ok(())
    }

    async fn retry_download(
        &self,
        content_id: &str,
        display_name: &str,
    ) -> Result<(), EngineError> {
        self.record(format!("retry_download:{}:{}", content_id, display_name));
        self.write()?;
        self.enqueue(content_id, display_name);
        Ok(())
    }

    async fn check_path_exists(&self, path: &str) -> Result<bool, EngineError> {
        self.record(format!("check_path_exists:{}", path));
        self.read()?;
        Ok(self.existing_paths.lock().unwrap().contains(path))
    }

    async fn open_folder(&self, path: &str) -> Result<(), EngineError> {
        self.record(format!("open_folder:{}", path));
        self.write()
    }

    async fn subscribe_changes(&self) -> Result<ChangeFeed, EngineError> {
        self.record("subscribe_changes".into());
        self.read()?;
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push(tx);
        Ok(ChangeFeed::new(rx, None))
    }
}

pub fn job(id: &str, status: JobStatus) -> Job {
    Job {
        id: id.to_string(),
        content_id: format!("content-{}", id),
        display_name: format!("Job {}", id),
        status,
        install_path: None,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn record(id: &str, install_path: &str) -> HistoryRecord {
    HistoryRecord {
        id: id.to_string(),
        content_id: format!("content-{}", id),
        display_name: format!("Record {}", id),
        install_path: install_path.to_string(),
        timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}
