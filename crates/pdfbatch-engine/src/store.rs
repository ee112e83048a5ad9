//! Storage collaborators
//!
//! The engine talks to two external stores through narrow trait seams: a
//! key-value blob store for document bytes and a row-based job table.
//! In-memory implementations back local mode and tests; production
//! backends implement the same traits.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::job::{Job, JobUpdate};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("blob store error: {0}")]
    Blob(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job store error: {0}")]
    Job(String),
}

/// Key-value blob store for source documents and result archives.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a stored object. `Ok(None)` means the path does not exist;
    /// `Err` is a transport-level failure worth retrying.
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn store(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// Row store for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> Result<(), StoreError>;

    /// Apply a partial update. Implementations must enforce the forward-only
    /// status machine (see [`Job::apply`]).
    async fn update(&self, id: &str, update: JobUpdate) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;
}

/// In-memory blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob directly, bypassing the trait.
    pub async fn put(&self, path: &str, bytes: Vec<u8>) {
        self.blobs.write().await.insert(path.to_string(), bytes);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn store(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        self.blobs.write().await.insert(path.to_string(), bytes);
        Ok(())
    }
}

/// In-memory job table
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.apply(update).map_err(|e| StoreError::Job(e.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use pdfbatch_core::OperationKind;

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let store = MemoryBlobStore::new();
        store
            .store("docs/a.pdf", vec![1, 2, 3], "application/pdf")
            .await
            .unwrap();

        assert_eq!(store.fetch("docs/a.pdf").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.fetch("docs/missing.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_job_insert_update_get() {
        let store = MemoryJobStore::new();
        let job = Job::new("user-1", OperationKind::Merge, 3);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store
            .update(&id, JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();
        store.update(&id, JobUpdate::progress(2, vec![])).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Processing);
        assert_eq!(fetched.processed, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_job_fails() {
        let store = MemoryJobStore::new();
        let result = store
            .update("no-such-job", JobUpdate::progress(1, vec![]))
            .await;
        assert!(matches!(result, Err(StoreError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_refuses_backward_transition() {
        let store = MemoryJobStore::new();
        let job = Job::new("user-1", OperationKind::Split, 1);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store
            .update(&id, JobUpdate::status(JobStatus::Processing))
            .await
            .unwrap();
        store
            .update(&id, JobUpdate::failed(vec!["boom".into()]))
            .await
            .unwrap();

        let result = store
            .update(&id, JobUpdate::status(JobStatus::Completed))
            .await;
        assert!(matches!(result, Err(StoreError::Job(_))));
    }
}
