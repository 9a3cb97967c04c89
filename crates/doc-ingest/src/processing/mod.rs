//! Background processing with job status tracking

mod job_tracker;
mod worker;

pub use job_tracker::{Job, JobStatus, JobTracker, TrackerStats};
pub use worker::UploadWorkflow;
