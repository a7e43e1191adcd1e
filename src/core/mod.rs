pub mod models;
pub mod sanitize;
pub mod status;
pub mod workshop;

pub use models::{HistoryRecord, Job, default_display_name};
pub use sanitize::sanitize_name;
pub use status::JobStatus;
