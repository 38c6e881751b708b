//! Job admission, status tracking, and background workers

pub mod manager;
pub mod types;

pub use manager::JobManager;
pub use types::{JobError, JobKind, JobRecord, JobRequest, JobStatus, sanitize_job_id};
