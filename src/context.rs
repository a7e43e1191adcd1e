use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::config::AppConfig;
use crate::daemon::queue::QueueManager;

/// Shared state of the engine daemon.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: Connection,
    pub queue: QueueManager,
}

impl AppContext {
    pub fn new(config: AppConfig, db: Connection, queue: QueueManager) -> Self {
        Self {
            config: Arc::new(config),
            db,
            queue,
        }
    }
}
