//! Decides between "open folder" and "retry" for history records.
//!
//! Each record's install path is checked on its own. Until a check comes back
//! the record is assumed missing, so the offered action is always usable.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::engine::{Engine, EngineError};
use crate::core::HistoryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Open,
    Retry,
}

/// A pending filesystem check for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCheck {
    pub record_id: String,
    pub path: String,
}

impl PathCheck {
    /// Ask the engine whether the path exists. An empty path is answered
    /// locally with `false`.
    pub async fn run(&self, engine: &dyn Engine) -> Result<bool, EngineError> {
        if self.path.is_empty() {
            return Ok(false);
        }
        engine.check_path_exists(&self.path).await
    }
}

#[derive(Debug)]
struct Entry {
    path: String,
    exists: Option<bool>,
}

#[derive(Debug, Default)]
pub struct ExistenceResolver {
    entries: HashMap<String, Entry>,
}

impl ExistenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the records of a new history snapshot and return the checks that
    /// still need to run. Records with an empty install path never produce a
    /// check.
    pub fn sync(&mut self, records: &[HistoryRecord]) -> Vec<PathCheck> {
        let mut entries = HashMap::with_capacity(records.len());
        let mut checks = Vec::new();

        for record in records {
            let (exists, needs_check) = match self.entries.remove(&record.id) {
                Some(prev) if prev.path == record.install_path => (prev.exists, false),
                _ if record.install_path.is_empty() => (Some(false), false),
                _ => (None, true),
            };
            if needs_check {
                checks.push(PathCheck {
                    record_id: record.id.clone(),
                    path: record.install_path.clone(),
                });
            }
            entries.insert(
                record.id.clone(),
                Entry {
                    path: record.install_path.clone(),
                    exists,
                },
            );
        }

        self.entries = entries;
        checks
    }

    /// Forget every result so the next [`sync`](Self::sync) checks again.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    /// Record the outcome of a check. Results for records that left the
    /// snapshot or changed path are dropped. Errors count as "missing".
    pub fn apply(&mut self, check: &PathCheck, result: Result<bool, EngineError>) {
        let Some(entry) = self.entries.get_mut(&check.record_id) else {
            debug!(id = %check.record_id, "Discarding check for removed record");
            return;
        };
        if entry.path != check.path {
            debug!(id = %check.record_id, "Discarding stale path check");
            return;
        }

        entry.exists = Some(result.unwrap_or_else(|e| {
            warn!(path = %check.path, error = %e, "Path check failed");
            false
        }));
    }

    pub fn exists(&self, record_id: &str) -> bool {
        self.entries
            .get(record_id)
            .and_then(|e| e.exists)
            .unwrap_or(false)
    }

    pub fn is_resolved(&self, record_id: &str) -> bool {
        self.entries
            .get(record_id)
            .is_some_and(|e| e.exists.is_some())
    }

    pub fn action_for(&self, record: &HistoryRecord) -> HistoryAction {
        if !record.install_path.is_empty() && self.exists(&record.id) {
            HistoryAction::Open
        } else {
            HistoryAction::Retry
        }
    }
}
