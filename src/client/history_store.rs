use tracing::{debug, info, warn};

use super::dispatcher::ActionError;
use super::engine::{Engine, EngineError};
use crate::core::HistoryRecord;

/// Client-side cache of archived downloads.
///
/// Mutations go to the engine and are followed by a full re-fetch; the store
/// never edits its snapshot locally.
#[derive(Debug, Default)]
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
    last_error: Option<String>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn fetch_all(&mut self, engine: &dyn Engine) -> bool {
        let result = engine.get_history().await;
        self.apply(result)
    }

    pub fn apply(&mut self, result: Result<Vec<HistoryRecord>, EngineError>) -> bool {
        match result {
            Ok(records) => {
                debug!(records = records.len(), "History refreshed");
                self.records = records;
                self.last_error = None;
                true
            }
            Err(e) => {
                warn!(error = %e, "History fetch failed, keeping previous snapshot");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Delete one record. Unknown ids are not an error.
    pub async fn remove(&mut self, engine: &dyn Engine, id: &str) -> Result<(), ActionError> {
        engine.remove_history_item(id).await.map_err(|e| {
            warn!(id, error = %e, "Failed to remove history item");
            ActionError::Remove(e)
        })?;
        info!(id, "History item removed");
        self.fetch_all(engine).await;
        Ok(())
    }

    pub async fn clear_all(&mut self, engine: &dyn Engine) -> Result<(), ActionError> {
        engine.clear_history().await.map_err(|e| {
            warn!(error = %e, "Failed to clear history");
            ActionError::Clear(e)
        })?;
        info!("History cleared");
        self.fetch_all(engine).await;
        Ok(())
    }

    /// Re-submit an archived download. The record itself stays in history.
    pub async fn retry(
        &self,
        engine: &dyn Engine,
        content_id: &str,
        display_name: &str,
    ) -> Result<(), ActionError> {
        engine
            .retry_download(content_id, display_name)
            .await
            .map_err(|e| {
                warn!(content_id, error = %e, "Failed to retry download");
                ActionError::Retry(e)
            })?;
        info!(content_id, "Download resubmitted");
        Ok(())
    }
}
