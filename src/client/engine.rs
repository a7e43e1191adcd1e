//! The engine boundary as seen by the client.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::{HistoryRecord, Job};
use crate::rpc::ClientError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),
    #[error("engine rejected the request: {0}")]
    Rejected(String),
    #[error("malformed engine response: {0}")]
    Malformed(String),
}

impl From<ClientError> for EngineError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Connect(_) | ClientError::Io(_) | ClientError::Closed => {
                Self::Unreachable(e.to_string())
            }
            ClientError::Serialize(_) | ClientError::Parse(_) => Self::Malformed(e.to_string()),
            ClientError::Rpc(err) => Self::Rejected(err.message),
        }
    }
}

/// Commands and the change channel offered by the download engine.
///
/// The engine owns all job and history state; implementations only transport
/// requests to it.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn add_download(&self, content_id: &str, display_name: &str) -> Result<(), EngineError>;
    async fn get_queue(&self) -> Result<Vec<Job>, EngineError>;
    async fn get_history(&self) -> Result<Vec<HistoryRecord>, EngineError>;
    async fn remove_history_item(&self, id: &str) -> Result<(), EngineError>;
    async fn clear_history(&self) -> Result<(), EngineError>;
    async fn retry_download(&self, content_id: &str, display_name: &str)
    -> Result<(), EngineError>;
    async fn check_path_exists(&self, path: &str) -> Result<bool, EngineError>;
    async fn open_folder(&self, path: &str) -> Result<(), EngineError>;
    /// Open the "queue changed" channel.
    async fn subscribe_changes(&self) -> Result<ChangeFeed, EngineError>;
}

/// Stream of payload-free "queue changed" signals.
///
/// Dropping the feed stops the task that reads it, if any.
pub struct ChangeFeed {
    rx: mpsc::Receiver<()>,
    reader: Option<JoinHandle<()>>,
}

impl ChangeFeed {
    pub fn new(rx: mpsc::Receiver<()>, reader: Option<JoinHandle<()>>) -> Self {
        Self { rx, reader }
    }

    /// Wait for the next signal. Returns false once the engine side is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
