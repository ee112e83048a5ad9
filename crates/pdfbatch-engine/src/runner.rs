//! Chunked batch runner
//!
//! Drives a whole batch to a terminal job state with bounded concurrency
//! and bounded memory:
//!
//! - the instruction list is partitioned into fixed-size chunks; chunks run
//!   strictly one after another
//! - within a chunk every instruction is spawned concurrently, then settled
//!   in original instruction order so progress counts and error messages
//!   are deterministic
//! - progress is persisted to the job store after every instruction, not
//!   per chunk, so a polling client sees fine-grained movement
//! - the whole batch races one wall-clock deadline; on expiry the driving
//!   future is abandoned (in-flight tasks are not cancelled, their results
//!   are simply ignored) and the job is force-failed
//!
//! Exactly one runner may own a given job id; callers create one job per
//! submission and invoke one runner per job.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use pdfbatch_core::Instruction;

use crate::archive::{ArchiveBuilder, ArchiveError};
use crate::config::BatchConfig;
use crate::job::{JobStatus, JobUpdate};
use crate::ops::execute_instruction;
use crate::store::{BlobStore, JobStore, StoreError};

/// Batch-fatal failure. Per-instruction problems never surface here; they
/// are converted to job error strings inside the chunk loop.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("archive assembly failed: {0}")]
    Archive(#[from] ArchiveError),
}

pub struct BatchRunner<B, J> {
    blob: Arc<B>,
    jobs: Arc<J>,
    config: BatchConfig,
}

impl<B, J> BatchRunner<B, J>
where
    B: BlobStore + 'static,
    J: JobStore + 'static,
{
    pub fn new(blob: Arc<B>, jobs: Arc<J>, config: BatchConfig) -> Self {
        Self { blob, jobs, config }
    }

    /// Drive the job to a terminal state and report which one was written.
    ///
    /// Errors from this method are job-store failures only; everything
    /// else ends up recorded on the job itself.
    pub async fn run(
        &self,
        job_id: &str,
        instructions: Vec<Instruction>,
    ) -> Result<JobStatus, EngineError> {
        self.jobs
            .update(job_id, JobUpdate::status(JobStatus::Processing))
            .await?;
        info!(job_id, total = instructions.len(), "batch started");

        match timeout(self.config.deadline, self.drive(job_id, instructions)).await {
            Ok(Ok(())) => Ok(JobStatus::Completed),
            Ok(Err(err)) => {
                warn!(job_id, %err, "batch failed");
                self.fail(job_id, err.to_string()).await?;
                Ok(JobStatus::Failed)
            }
            Err(_) => {
                let secs = self.config.deadline.as_secs();
                warn!(job_id, "batch abandoned at the {secs}s deadline");
                self.fail(job_id, format!("batch timed out after {secs} seconds"))
                    .await?;
                Ok(JobStatus::Failed)
            }
        }
    }

    /// Force the terminal `failed` state, appending the fatal cause to
    /// whatever errors were already persisted.
    async fn fail(&self, job_id: &str, cause: String) -> Result<(), EngineError> {
        let mut errors = match self.jobs.get(job_id).await? {
            Some(job) => job.errors,
            None => Vec::new(),
        };
        errors.push(cause);
        self.jobs.update(job_id, JobUpdate::failed(errors)).await?;
        Ok(())
    }

    async fn drive(&self, job_id: &str, instructions: Vec<Instruction>) -> Result<(), EngineError> {
        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = instructions.len().div_ceil(chunk_size);
        let mut archive = ArchiveBuilder::new();
        let mut errors: Vec<String> = Vec::new();
        let mut processed = 0usize;

        for (chunk_index, chunk) in instructions.chunks(chunk_size).enumerate() {
            debug!(job_id, chunk = chunk_index + 1, of = chunk_count, "processing chunk");

            let mut handles = Vec::with_capacity(chunk.len());
            for instruction in chunk {
                let blob = Arc::clone(&self.blob);
                let retry = self.config.retry.clone();
                let instruction = instruction.clone();
                handles.push(tokio::spawn(async move {
                    execute_instruction(blob.as_ref(), &retry, &instruction).await
                }));
            }

            // Settle in original instruction order; a sibling's failure
            // never cancels the rest of the chunk.
            for (instruction, handle) in chunk.iter().zip(handles) {
                match handle.await {
                    Ok(Ok(output)) => {
                        errors.extend(output.warnings);
                        for (name, bytes) in output.outputs {
                            archive.add_entry(&name, &bytes)?;
                        }
                    }
                    Ok(Err(err)) => {
                        errors.push(format!("{}: {}", instruction.label(), err));
                    }
                    Err(join_err) => {
                        errors.push(format!("{}: task failed: {}", instruction.label(), join_err));
                    }
                }
                processed += 1;
                self.jobs
                    .update(job_id, JobUpdate::progress(processed, errors.clone()))
                    .await?;
            }

            if chunk_index + 1 < chunk_count {
                sleep(self.config.chunk_pause).await;
            }
        }

        let entries = archive.entry_count();
        let raw_bytes = archive.raw_bytes();
        let bytes = archive.finish()?;
        let location = format!("results/{job_id}.zip");
        self.blob
            .store(&location, bytes, "application/zip")
            .await?;
        self.jobs
            .update(job_id, JobUpdate::completed(location, errors, raw_bytes))
            .await?;
        info!(job_id, entries, raw_bytes, "batch completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::job::Job;
    use crate::retry::RetryPolicy;
    use crate::store::{MemoryBlobStore, MemoryJobStore};
    use crate::testutil::create_test_pdf;
    use pdfbatch_core::OperationKind;

    fn test_config() -> BatchConfig {
        BatchConfig {
            chunk_size: 10,
            chunk_pause: Duration::from_millis(1),
            deadline: Duration::from_secs(30),
            retry: RetryPolicy::no_retry(),
            ..BatchConfig::default()
        }
    }

    async fn seeded_stores() -> (Arc<MemoryBlobStore>, Arc<MemoryJobStore>) {
        let blob = Arc::new(MemoryBlobStore::new());
        blob.put("a.pdf", create_test_pdf(2, "A")).await;
        blob.put("b.pdf", create_test_pdf(3, "B")).await;
        (blob, Arc::new(MemoryJobStore::new()))
    }

    async fn insert_job(
        jobs: &MemoryJobStore,
        operation: OperationKind,
        total: usize,
    ) -> String {
        let job = Job::new("user-1", operation, total);
        let id = job.id.clone();
        jobs.insert(job).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_batch_of_25_merges_across_3_chunks() {
        let (blob, jobs) = seeded_stores().await;
        let instructions: Vec<Instruction> = (0..25)
            .map(|i| Instruction::Merge {
                source_files: vec!["a.pdf".into(), "b.pdf".into()],
                output_name: format!("merged_{i}.pdf"),
            })
            .collect();

        let job_id = insert_job(&jobs, OperationKind::Merge, instructions.len()).await;
        let runner = BatchRunner::new(blob.clone(), jobs.clone(), test_config());
        let status = runner.run(&job_id, instructions).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = jobs.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed, 25);
        assert!(job.errors.is_empty());
        assert!(job.total_size_bytes > 0);

        let location = job.result_location.unwrap();
        let archive_bytes = blob.fetch(&location).await.unwrap().unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(archive_bytes)).unwrap();
        assert_eq!(archive.len(), 25);
    }

    #[tokio::test]
    async fn test_soft_error_does_not_fail_the_instruction() {
        let (blob, jobs) = seeded_stores().await;
        let instructions = vec![Instruction::Merge {
            source_files: vec!["a.pdf".into(), "ghost.pdf".into(), "b.pdf".into()],
            output_name: "merged.pdf".into(),
        }];

        let job_id = insert_job(&jobs, OperationKind::Merge, 1).await;
        let runner = BatchRunner::new(blob, jobs.clone(), test_config());
        let status = runner.run(&job_id, instructions).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = jobs.get(&job_id).await.unwrap().unwrap();
        // The merge succeeded and the missing source is still on record.
        assert_eq!(job.processed, 1);
        assert_eq!(job.errors.len(), 1);
        assert!(job.errors[0].contains("ghost.pdf"));
        assert!(job.result_location.is_some());
    }

    #[tokio::test]
    async fn test_hard_failure_never_cancels_siblings() {
        let (blob, jobs) = seeded_stores().await;
        let instructions = vec![
            Instruction::DeletePages {
                source_file: "ghost.pdf".into(),
                pages_to_delete: vec![0],
                output_name: "broken.pdf".into(),
            },
            Instruction::DeletePages {
                source_file: "b.pdf".into(),
                pages_to_delete: vec![0],
                output_name: "trimmed.pdf".into(),
            },
        ];

        let job_id = insert_job(&jobs, OperationKind::Delete, 2).await;
        let runner = BatchRunner::new(blob.clone(), jobs.clone(), test_config());
        let status = runner.run(&job_id, instructions).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = jobs.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.processed, 2);
        assert_eq!(job.errors.len(), 1);
        assert!(job.errors[0].contains("broken.pdf"));

        let archive_bytes = blob
            .fetch(&job.result_location.unwrap())
            .await
            .unwrap()
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        assert!(archive.by_name("trimmed.pdf").is_ok());
    }

    /// Job store wrapper recording every persisted `processed` value.
    struct ProgressRecorder {
        inner: MemoryJobStore,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl JobStore for ProgressRecorder {
        async fn insert(&self, job: Job) -> Result<(), StoreError> {
            self.inner.insert(job).await
        }

        async fn update(&self, id: &str, update: JobUpdate) -> Result<(), StoreError> {
            if let Some(processed) = update.processed {
                self.seen.lock().await.push(processed);
            }
            self.inner.update(id, update).await
        }

        async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.get(id).await
        }
    }

    #[tokio::test]
    async fn test_progress_is_persisted_per_instruction_and_monotonic() {
        let (blob, _) = seeded_stores().await;
        let jobs = Arc::new(ProgressRecorder {
            inner: MemoryJobStore::new(),
            seen: Mutex::new(Vec::new()),
        });

        let instructions: Vec<Instruction> = (0..7)
            .map(|i| Instruction::Reorder {
                source_file: "b.pdf".into(),
                new_page_order: vec![2, 1, 0],
                output_name: format!("r{i}.pdf"),
            })
            .collect();

        let job = Job::new("user-1", OperationKind::Reorder, 7);
        let job_id = job.id.clone();
        jobs.insert(job).await.unwrap();

        let config = BatchConfig {
            chunk_size: 3,
            ..test_config()
        };
        let runner = BatchRunner::new(blob, jobs.clone(), config);
        runner.run(&job_id, instructions).await.unwrap();

        let seen = jobs.seen.lock().await.clone();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    /// Blob store whose fetches hang long enough to trip a short deadline.
    struct SlowBlobStore {
        inner: MemoryBlobStore,
    }

    #[async_trait]
    impl BlobStore for SlowBlobStore {
        async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
            sleep(Duration::from_secs(5)).await;
            self.inner.fetch(path).await
        }

        async fn store(
            &self,
            path: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<(), StoreError> {
            self.inner.store(path, bytes, content_type).await
        }
    }

    #[tokio::test]
    async fn test_deadline_forces_failed_state() {
        let blob = Arc::new(SlowBlobStore {
            inner: MemoryBlobStore::new(),
        });
        blob.inner.put("a.pdf", create_test_pdf(1, "A")).await;
        let jobs = Arc::new(MemoryJobStore::new());

        let instructions = vec![Instruction::Rename {
            old_name: "a.pdf".into(),
            new_name: "b.pdf".into(),
        }];

        let job_id = insert_job(&jobs, OperationKind::Rename, 1).await;
        let config = BatchConfig {
            deadline: Duration::from_millis(50),
            ..test_config()
        };
        let runner = BatchRunner::new(blob, jobs.clone(), config);
        let status = runner.run(&job_id, instructions).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let job = jobs.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.errors.iter().any(|e| e.contains("timed out")));
        // Nothing partial is persisted for an abandoned batch.
        assert!(job.result_location.is_none());
    }

    /// Blob store that rejects writes, to exercise archive-persist failure.
    struct ReadOnlyBlobStore {
        inner: MemoryBlobStore,
    }

    #[async_trait]
    impl BlobStore for ReadOnlyBlobStore {
        async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.fetch(path).await
        }

        async fn store(
            &self,
            _path: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Blob("bucket is read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_archive_persist_failure_fails_the_job() {
        let blob = Arc::new(ReadOnlyBlobStore {
            inner: MemoryBlobStore::new(),
        });
        blob.inner.put("a.pdf", create_test_pdf(2, "A")).await;
        let jobs = Arc::new(MemoryJobStore::new());

        let instructions = vec![Instruction::Reorder {
            source_file: "a.pdf".into(),
            new_page_order: vec![1, 0],
            output_name: "out.pdf".into(),
        }];

        let job_id = insert_job(&jobs, OperationKind::Reorder, 1).await;
        let runner = BatchRunner::new(blob, jobs.clone(), test_config());
        let status = runner.run(&job_id, instructions).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let job = jobs.get(&job_id).await.unwrap().unwrap();
        // The instruction itself finished before the upload failed.
        assert_eq!(job.processed, 1);
        assert!(job.errors.iter().any(|e| e.contains("read-only")));
    }

    #[tokio::test]
    async fn test_empty_chunk_tail_handled() {
        // 11 instructions with chunk size 10: the second chunk has one
        // instruction and no pause follows it.
        let (blob, jobs) = seeded_stores().await;
        let instructions: Vec<Instruction> = (0..11)
            .map(|i| Instruction::Rename {
                old_name: "a.pdf".into(),
                new_name: format!("copy_{i}.pdf"),
            })
            .collect();

        let job_id = insert_job(&jobs, OperationKind::Rename, 11).await;
        let runner = BatchRunner::new(blob, jobs.clone(), test_config());
        let status = runner.run(&job_id, instructions).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = jobs.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.processed, 11);
    }
}
