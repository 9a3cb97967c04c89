//! Background ingestion of uploaded files

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::Error;
use crate::ingestion::{FileOutcome, IngestPipeline};

use super::job_tracker::{JobStatus, JobTracker};

/// Runs single-file ingestion off the caller's path and records the result
/// in the [`JobTracker`]
pub struct UploadWorkflow {
    pipeline: Arc<IngestPipeline>,
    tracker: Arc<JobTracker>,
    semaphore: Arc<Semaphore>,
    file_timeout: Duration,
    delete_source_on_success: bool,
}

impl UploadWorkflow {
    /// Create a workflow; concurrency, timeout and cleanup come from the pipeline's config
    pub fn new(pipeline: Arc<IngestPipeline>, tracker: Arc<JobTracker>) -> Self {
        let jobs = &pipeline.config().jobs;
        let parallel_jobs = jobs.worker_count();
        let file_timeout = jobs.file_timeout();
        let delete_source_on_success = jobs.delete_source_on_success;

        tracing::info!(
            "Upload workflow configured: {} parallel jobs, {}s timeout",
            parallel_jobs,
            file_timeout.as_secs()
        );

        Self {
            pipeline,
            tracker,
            semaphore: Arc::new(Semaphore::new(parallel_jobs)),
            file_timeout,
            delete_source_on_success,
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Start ingesting `path` in the background and return its job id.
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, path: impl Into<PathBuf>) -> Uuid {
        self.spawn(path.into()).0
    }

    /// Like [`UploadWorkflow::enqueue`], also returning the task handle
    pub fn spawn(&self, path: PathBuf) -> (Uuid, JoinHandle<()>) {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let job_id = self.tracker.create(&filename);

        let job = JobContext {
            job_id,
            path,
            filename,
            pipeline: self.pipeline.clone(),
            tracker: self.tracker.clone(),
            semaphore: self.semaphore.clone(),
            file_timeout: self.file_timeout,
            delete_source_on_success: self.delete_source_on_success,
        };

        (job_id, tokio::spawn(job.run()))
    }
}

struct JobContext {
    job_id: Uuid,
    path: PathBuf,
    filename: String,
    pipeline: Arc<IngestPipeline>,
    tracker: Arc<JobTracker>,
    semaphore: Arc<Semaphore>,
    file_timeout: Duration,
    delete_source_on_success: bool,
}

impl JobContext {
    async fn run(self) {
        let (status, message) = self.execute().await;

        match status {
            JobStatus::Completed => tracing::info!("Job {} [{}]: {}", self.job_id, self.filename, message),
            _ => tracing::error!("Job {} [{}]: {}", self.job_id, self.filename, message),
        }

        if status == JobStatus::Completed && self.delete_source_on_success {
            remove_source(&self.path);
        }

        if let Err(e) = self.tracker.update(self.job_id, status, message) {
            // evicted while running
            tracing::warn!("Could not record result of job {}: {}", self.job_id, e);
        }
    }

    async fn execute(&self) -> (JobStatus, String) {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return (JobStatus::Error, "Worker pool is shut down".to_string()),
        };

        let pipeline = self.pipeline.clone();
        let path = self.path.clone();
        let task = tokio::task::spawn_blocking(move || pipeline.process_file(&path));

        match timeout(self.file_timeout, task).await {
            Ok(Ok(Ok(FileOutcome::Written {
                artifact, chars, ..
            }))) => (
                JobStatus::Completed,
                format!(
                    "Text extracted: {} characters saved to {}",
                    chars,
                    artifact
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                ),
            ),
            Ok(Ok(Ok(FileOutcome::Skipped { existing, .. }))) => (
                JobStatus::Completed,
                format!("File already processed ({})", existing.display()),
            ),
            Ok(Ok(Err(e))) => (JobStatus::Error, e.to_string()),
            Ok(Err(e)) => (
                JobStatus::Error,
                Error::internal(format!("ingestion task crashed: {}", e)).to_string(),
            ),
            Err(_) => (
                JobStatus::Error,
                format!("Processing timeout after {}s", self.file_timeout.as_secs()),
            ),
        }
    }
}

fn remove_source(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed uploaded source {}", path.display()),
        Err(e) => tracing::warn!("Could not remove uploaded source {}: {}", path.display(), e),
    }
}
