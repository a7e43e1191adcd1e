use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::engine::{Engine, EngineError};
use crate::core::default_display_name;

/// A write command the engine did not accept. Shown to the operator.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Could not add download: {0}")]
    Add(EngineError),
    #[error("Could not remove history item: {0}")]
    Remove(EngineError),
    #[error("Could not clear history: {0}")]
    Clear(EngineError),
    #[error("Could not retry download: {0}")]
    Retry(EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Submitted {
        content_id: String,
        display_name: String,
    },
    /// Nothing was sent because the content id was blank.
    Ignored,
}

/// Turns operator intent into engine commands.
///
/// Adding does not refresh the queue; the new job shows up once the engine's
/// change notification triggers the next refresh.
#[derive(Clone)]
pub struct ActionDispatcher {
    engine: Arc<dyn Engine>,
}

impl ActionDispatcher {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn shared_engine(&self) -> Arc<dyn Engine> {
        self.engine.clone()
    }

    pub async fn add(
        &self,
        content_id: &str,
        display_name: Option<&str>,
    ) -> Result<AddOutcome, ActionError> {
        let content_id = content_id.trim();
        if content_id.is_empty() {
            return Ok(AddOutcome::Ignored);
        }

        let display_name = match display_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_display_name(content_id),
        };

        self.engine
            .add_download(content_id, &display_name)
            .await
            .map_err(|e| {
                warn!(content_id, error = %e, "Failed to add download");
                ActionError::Add(e)
            })?;

        info!(content_id, name = %display_name, "Download submitted");
        Ok(AddOutcome::Submitted {
            content_id: content_id.to_string(),
            display_name,
        })
    }

    /// Ask the engine to reveal `path`. Failures are only logged.
    pub async fn open_folder(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        if let Err(e) = self.engine.open_folder(path).await {
            warn!(path, error = %e, "Failed to open folder");
        }
    }
}

/// Which job, if any, has its failure log expanded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpandState {
    expanded: Option<String>,
}

impl ExpandState {
    pub fn toggle(&mut self, id: &str) {
        if self.is_expanded(id) {
            self.expanded = None;
        } else {
            self.expand(id);
        }
    }

    /// Expand `id`, collapsing whatever was open before.
    pub fn expand(&mut self, id: &str) {
        self.expanded = Some(id.to_string());
    }

    pub fn collapse(&mut self, id: &str) {
        if self.is_expanded(id) {
            self.expanded = None;
        }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.as_deref() == Some(id)
    }

    pub fn expanded(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    /// Collapse if the expanded job is no longer listed.
    pub fn retain<'a>(&mut self, mut ids: impl Iterator<Item = &'a str>) {
        if let Some(current) = &self.expanded {
            if !ids.any(|id| id == current) {
                self.expanded = None;
            }
        }
    }
}
