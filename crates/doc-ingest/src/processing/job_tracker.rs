//! In-memory registry of background ingestion jobs
//!
//! Jobs are not persisted. Finished jobs are evicted once they are older than
//! the retention window so the map does not grow without bound.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::JobConfig;
use crate::error::{Error, Result};

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Status record of one ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared job registry. Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct JobTracker {
    jobs: Arc<DashMap<Uuid, Job>>,
    retention: Duration,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new(JobConfig::default().retention())
    }
}

impl JobTracker {
    /// Create a tracker that keeps finished jobs for `retention`
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            retention,
        }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(config.retention())
    }

    /// Register a new job in `processing` state
    pub fn create(&self, filename: &str) -> Uuid {
        self.evict_finished(self.retention);

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            status: JobStatus::Processing,
            message: "Processing document...".to_string(),
            created_at: now,
            updated_at: now,
        };
        let id = job.id;
        self.jobs.insert(id, job);

        tracing::debug!("Created job {} for {}", id, filename);
        id
    }

    /// Set status and message. Transitions are not validated.
    pub fn update(&self, id: Uuid, status: JobStatus, message: impl Into<String>) -> Result<()> {
        let mut job = self.jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.status = status;
        job.message = message.into();
        job.updated_at = Utc::now();
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|job| job.clone())
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Drop finished jobs not updated within `older_than`. Returns how many were removed.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let Ok(window) = chrono::Duration::from_std(older_than) else {
            return 0;
        };
        let cutoff = Utc::now() - window;

        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.status.is_finished() && job.updated_at <= cutoff));
        let evicted = before.saturating_sub(self.jobs.len());

        if evicted > 0 {
            tracing::debug!("Evicted {} finished jobs", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn stats(&self) -> TrackerStats {
        let mut stats = TrackerStats {
            total: self.jobs.len(),
            ..TrackerStats::default()
        };
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Error => stats.error += 1,
            }
        }
        stats
    }
}

/// Tracker statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerStats {
    pub total: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let tracker = JobTracker::default();
        let id = tracker.create("scan.png");

        let job = tracker.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.filename, "scan.png");

        tracker.update(id, JobStatus::Completed, "done").unwrap();
        let job = tracker.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.message, "done");
        assert!(job.updated_at >= job.created_at);

        // no transition checks
        tracker.update(id, JobStatus::Processing, "again").unwrap();
        assert_eq!(tracker.get(id).unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_unknown_job() {
        let tracker = JobTracker::default();
        let id = Uuid::new_v4();
        assert!(tracker.get(id).is_none());
        assert!(matches!(
            tracker.update(id, JobStatus::Error, "x"),
            Err(Error::JobNotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&JobStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(serde_json::to_string(&JobStatus::Completed).unwrap(), "\"completed\"");
        assert_eq!(serde_json::to_string(&JobStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_evicts_only_finished() {
        let tracker = JobTracker::default();
        let running = tracker.create("a.pdf");
        let done = tracker.create("b.pdf");
        let failed = tracker.create("c.pdf");
        tracker.update(done, JobStatus::Completed, "ok").unwrap();
        tracker.update(failed, JobStatus::Error, "boom").unwrap();

        assert_eq!(tracker.evict_finished(Duration::from_secs(3600)), 0);
        assert_eq!(tracker.evict_finished(Duration::ZERO), 2);
        assert!(tracker.get(running).is_some());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_create_applies_retention() {
        let tracker = JobTracker::new(Duration::ZERO);
        let first = tracker.create("a.pdf");
        tracker.update(first, JobStatus::Completed, "ok").unwrap();

        tracker.create("b.pdf");
        assert!(tracker.get(first).is_none());
        assert_eq!(tracker.stats().processing, 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = JobTracker::default();
        let ids: Vec<Uuid> = (0..32).map(|i| tracker.create(&format!("{}.txt", i))).collect();

        std::thread::scope(|scope| {
            for id in &ids {
                let tracker = tracker.clone();
                scope.spawn(move || tracker.update(*id, JobStatus::Completed, "ok").unwrap());
            }
        });

        let stats = tracker.stats();
        assert_eq!(stats.total, 32);
        assert_eq!(stats.completed, 32);
    }
}
