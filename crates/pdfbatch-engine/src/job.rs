//! Job record and its forward-only state machine
//!
//! The job record is the only channel through which a client observes an
//! asynchronous batch: the runner writes monotonically increasing progress
//! into it and a terminal state exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use pdfbatch_core::OperationKind;

/// Batch job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The state machine only moves forward:
    /// `queued → processing → {completed | failed}`. A batch that never
    /// starts may still fail directly from `queued`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Attempted transition out of a terminal state or backward through the
/// machine.
#[derive(Error, Debug)]
#[error("illegal job transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Persisted record of one batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub operation: OperationKind,
    pub status: JobStatus,
    pub total: usize,
    pub processed: usize,
    pub errors: Vec<String>,
    pub result_location: Option<String>,
    pub total_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(user_id: impl Into<String>, operation: OperationKind, total: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            operation,
            status: JobStatus::Queued,
            total,
            processed: 0,
            errors: Vec::new(),
            result_location: None,
            total_size_bytes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. Status moves only forward through the state
    /// machine and `processed` never decreases.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), IllegalTransition> {
        if let Some(next) = update.status {
            if next != self.status {
                if !self.status.can_transition_to(next) {
                    return Err(IllegalTransition {
                        from: self.status,
                        to: next,
                    });
                }
                self.status = next;
            }
        }
        if let Some(processed) = update.processed {
            self.processed = self.processed.max(processed);
        }
        if let Some(errors) = update.errors {
            self.errors = errors;
        }
        if let Some(location) = update.result_location {
            self.result_location = Some(location);
        }
        if let Some(size) = update.total_size_bytes {
            self.total_size_bytes = size;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial job update, the shape the job table's `update` accepts.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub processed: Option<usize>,
    pub errors: Option<Vec<String>>,
    pub result_location: Option<String>,
    pub total_size_bytes: Option<u64>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(processed: usize, errors: Vec<String>) -> Self {
        Self {
            processed: Some(processed),
            errors: Some(errors),
            ..Default::default()
        }
    }

    pub fn completed(result_location: String, errors: Vec<String>, total_size_bytes: u64) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            errors: Some(errors),
            result_location: Some(result_location),
            total_size_bytes: Some(total_size_bytes),
            ..Default::default()
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            errors: Some(errors),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("user-1", OperationKind::Merge, 10);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.processed, 0);
        assert!(job.errors.is_empty());
        assert!(job.result_location.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = Job::new("user-1", OperationKind::Merge, 2);
        job.apply(JobUpdate::status(JobStatus::Processing)).unwrap();
        job.apply(JobUpdate::progress(1, vec![])).unwrap();
        job.apply(JobUpdate::progress(2, vec![])).unwrap();
        job.apply(JobUpdate::completed("results/x.zip".into(), vec![], 123))
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed, 2);
        assert_eq!(job.result_location.as_deref(), Some("results/x.zip"));
        assert_eq!(job.total_size_bytes, 123);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = Job::new("user-1", OperationKind::Split, 1);
        job.apply(JobUpdate::status(JobStatus::Processing)).unwrap();
        job.apply(JobUpdate::failed(vec!["boom".into()])).unwrap();

        assert!(job
            .apply(JobUpdate::status(JobStatus::Processing))
            .is_err());
        assert!(job.apply(JobUpdate::status(JobStatus::Completed)).is_err());
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_no_backward_transition() {
        let mut job = Job::new("user-1", OperationKind::Delete, 1);
        job.apply(JobUpdate::status(JobStatus::Processing)).unwrap();
        assert!(job.apply(JobUpdate::status(JobStatus::Queued)).is_err());
    }

    #[test]
    fn test_queued_can_fail_directly() {
        let mut job = Job::new("user-1", OperationKind::Rename, 1);
        job.apply(JobUpdate::failed(vec!["never started".into()]))
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_processed_never_decreases() {
        let mut job = Job::new("user-1", OperationKind::Merge, 5);
        job.apply(JobUpdate::status(JobStatus::Processing)).unwrap();
        job.apply(JobUpdate::progress(4, vec![])).unwrap();
        job.apply(JobUpdate::progress(2, vec![])).unwrap();
        assert_eq!(job.processed, 4);
    }

    #[test]
    fn test_same_status_update_is_a_no_op() {
        let mut job = Job::new("user-1", OperationKind::Merge, 1);
        job.apply(JobUpdate::status(JobStatus::Queued)).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, r#""processing""#);
    }
}
