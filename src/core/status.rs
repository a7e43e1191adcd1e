//! Job lifecycle status.
//!
//! The engine reports status as an externally tagged JSON value. Anything that
//! does not match one of the four known shapes is kept verbatim in
//! [`JobStatus::Unrecognized`] so that one bad entry never breaks a whole list.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current lifecycle stage of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StatusRepr", into = "StatusRepr")]
pub enum JobStatus {
    Pending,
    /// `progress` is a percentage in `0..=100` when the engine knows it.
    Downloading {
        progress: Option<f32>,
    },
    Completed,
    /// Always carries a non-empty diagnostic log.
    Failed(String),
    /// Raw wire value of a status this client does not understand.
    Unrecognized(Value),
}

impl JobStatus {
    pub fn downloading(progress: Option<f32>) -> Self {
        Self::Downloading {
            progress: progress.and_then(normalize_progress),
        }
    }

    /// Build a `Failed` status, substituting a generic message for a blank log.
    pub fn failed(log: impl Into<String>) -> Self {
        let log = log.into();
        if log.trim().is_empty() {
            Self::Failed("Download failed".to_string())
        } else {
            Self::Failed(log)
        }
    }

    /// `Completed` and `Failed` end a job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    pub fn failure_log(&self) -> Option<&str> {
        match self {
            Self::Failed(log) => Some(log),
            _ => None,
        }
    }

    /// Short label for list rendering.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::Pending => Cow::Borrowed("Pending"),
            Self::Downloading { progress: Some(p) } => Cow::Owned(format!("Downloading {:.0}%", p)),
            Self::Downloading { progress: None } => Cow::Borrowed("Downloading…"),
            Self::Completed => Cow::Borrowed("Completed"),
            Self::Failed(_) => Cow::Borrowed("Failed"),
            Self::Unrecognized(raw) => Cow::Owned(raw.to_string()),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(log) => write!(f, "Failed: {}", log),
            other => f.write_str(&other.label()),
        }
    }
}

fn normalize_progress(p: f32) -> Option<f32> {
    if p.is_nan() {
        None
    } else {
        Some(p.clamp(0.0, 100.0))
    }
}

#[derive(Serialize, Deserialize)]
enum KnownStatus {
    Pending,
    Downloading {
        #[serde(default)]
        progress: Option<f32>,
    },
    Completed,
    Failed(String),
}

// Older engines send a bare "Downloading" string with no progress payload.
#[derive(Deserialize)]
enum BareStatus {
    Downloading,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Known(KnownStatus),
    #[serde(skip_serializing)]
    Bare(BareStatus),
    Other(Value),
}

impl From<StatusRepr> for JobStatus {
    fn from(repr: StatusRepr) -> Self {
        match repr {
            StatusRepr::Known(KnownStatus::Pending) => Self::Pending,
            StatusRepr::Known(KnownStatus::Downloading { progress }) => Self::downloading(progress),
            StatusRepr::Known(KnownStatus::Completed) => Self::Completed,
            StatusRepr::Known(KnownStatus::Failed(log)) if log.trim().is_empty() => {
                Self::Unrecognized(serde_json::json!({ "Failed": log }))
            }
            StatusRepr::Known(KnownStatus::Failed(log)) => Self::Failed(log),
            StatusRepr::Bare(BareStatus::Downloading) => Self::Downloading { progress: None },
            StatusRepr::Other(raw) => Self::Unrecognized(raw),
        }
    }
}

impl From<JobStatus> for StatusRepr {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => Self::Known(KnownStatus::Pending),
            JobStatus::Downloading { progress } => Self::Known(KnownStatus::Downloading { progress }),
            JobStatus::Completed => Self::Known(KnownStatus::Completed),
            JobStatus::Failed(log) => Self::Known(KnownStatus::Failed(log)),
            JobStatus::Unrecognized(raw) => Self::Other(raw),
        }
    }
}
