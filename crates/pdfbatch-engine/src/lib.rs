//! Asynchronous batch machinery for bulk PDF processing
//!
//! Where `pdfbatch-core` manipulates bytes, this crate runs batches: it
//! fetches sources from a [`store::BlobStore`] with retry and backoff,
//! executes instructions in fixed-size concurrent chunks under a hard
//! wall-clock deadline, assembles the outputs into one zip archive, and
//! keeps a pollable [`job::Job`] record up to date the whole way.

pub mod archive;
pub mod config;
pub mod job;
pub mod ops;
pub mod retry;
pub mod runner;
pub mod store;

pub use archive::{ArchiveBuilder, ArchiveError};
pub use config::BatchConfig;
pub use job::{Job, JobStatus, JobUpdate};
pub use ops::{execute_instruction, InstructionOutput, OpError};
pub use retry::{retry_with_backoff, RetryExhausted, RetryPolicy};
pub use runner::{BatchRunner, EngineError};
pub use store::{BlobStore, JobStore, MemoryBlobStore, MemoryJobStore, StoreError};
