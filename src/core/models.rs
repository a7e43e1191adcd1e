use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::JobStatus;

/// An in-flight or recently finished download tracked by the engine's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub content_id: String,
    pub display_name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub install_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Archived record of a job that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub content_id: String,
    pub display_name: String,
    #[serde(default)]
    pub install_path: String,
    pub timestamp: DateTime<Utc>,
}

/// Name given to a download when the operator leaves the name blank.
pub fn default_display_name(content_id: &str) -> String {
    format!("App {}", content_id)
}
