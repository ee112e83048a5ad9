//! Batch execution configuration

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Tunables for one runner instance. The defaults match the production
/// deployment: small chunks, a short courtesy pause between them, and a
/// deadline that stays under the hosting platform's execution ceiling.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Instructions processed concurrently; also the chunk length.
    pub chunk_size: usize,
    /// Pause between chunks so the storage backend gets breathing room.
    pub chunk_pause: Duration,
    /// Wall-clock budget for the whole batch.
    pub deadline: Duration,
    /// Retry policy for source fetches.
    pub retry: RetryPolicy,
    /// Submission cap on instruction count.
    pub max_instructions: usize,
    /// Submission cap on estimated batch size.
    pub max_batch_bytes: u64,
    /// Nominal per-document size used for the estimate; instructions carry
    /// no byte counts of their own.
    pub estimated_document_bytes: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            chunk_pause: Duration::from_millis(100),
            deadline: Duration::from_secs(25 * 60),
            retry: RetryPolicy::default(),
            max_instructions: 200,
            max_batch_bytes: 500 * 1024 * 1024,
            estimated_document_bytes: 5 * 1024 * 1024,
        }
    }
}
