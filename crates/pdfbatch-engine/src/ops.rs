//! Document op engine
//!
//! Executes exactly one [`Instruction`] against the blob store and returns
//! produced outputs plus any non-fatal problems. Failure classification:
//!
//! - a hard failure (`Err`) means the instruction produced no output at
//!   all — a fully missing source, zero usable pages. It aborts only this
//!   instruction; the runner records it and keeps going.
//! - a soft failure is carried in [`InstructionOutput::warnings`] next to
//!   a real output — e.g. a merge that lost some of its sources.

use thiserror::Error;
use tracing::debug;

use pdfbatch_core::{
    delete_pages, file_stem, merge_documents, page_count, rewrite_document, select_pages,
    Instruction, PdfOpError,
};

use crate::retry::{retry_with_backoff, RetryExhausted, RetryPolicy};
use crate::store::BlobStore;

/// Hard failure: the instruction produced nothing.
#[derive(Error, Debug)]
pub enum OpError {
    #[error("source file not found: {0}")]
    SourceMissing(String),

    #[error("no valid pages")]
    NoValidPages,

    #[error(transparent)]
    Pdf(#[from] PdfOpError),

    #[error(transparent)]
    Fetch(#[from] RetryExhausted),
}

/// Outputs of one instruction plus the soft errors hit producing them.
#[derive(Debug, Default)]
pub struct InstructionOutput {
    /// `(output name, bytes)` pairs; one for most operations, one per
    /// range for split.
    pub outputs: Vec<(String, Vec<u8>)>,
    pub warnings: Vec<String>,
}

impl InstructionOutput {
    fn single(name: &str, bytes: Vec<u8>) -> Self {
        Self {
            outputs: vec![(name.to_string(), bytes)],
            warnings: Vec::new(),
        }
    }
}

/// Execute one instruction. Fetches are retried per `retry`; see the
/// module docs for how failures are classified.
pub async fn execute_instruction(
    blob: &dyn BlobStore,
    retry: &RetryPolicy,
    instruction: &Instruction,
) -> Result<InstructionOutput, OpError> {
    debug!(label = instruction.label(), kind = %instruction.kind(), "executing instruction");

    match instruction {
        Instruction::Merge {
            source_files,
            output_name,
        } => merge_op(blob, retry, source_files, output_name).await,

        Instruction::DeletePages {
            source_file,
            pages_to_delete,
            output_name,
        } => {
            let bytes = fetch_required(blob, retry, source_file).await?;
            let output = delete_pages(&bytes, pages_to_delete)?;
            Ok(InstructionOutput::single(output_name, output))
        }

        Instruction::Split {
            source_file,
            page_ranges,
            output_names,
        } => split_op(blob, retry, source_file, page_ranges, output_names).await,

        Instruction::Reorder {
            source_file,
            new_page_order,
            output_name,
        } => {
            let bytes = fetch_required(blob, retry, source_file).await?;
            let output = select_pages(&bytes, new_page_order)?;
            Ok(InstructionOutput::single(output_name, output))
        }

        Instruction::Rename { old_name, new_name } => {
            let bytes = fetch_required(blob, retry, old_name).await?;
            let output = rewrite_document(&bytes, file_stem(new_name))?;
            Ok(InstructionOutput::single(new_name, output))
        }
    }
}

/// Retry-wrapped fetch of a source that must exist.
async fn fetch_required(
    blob: &dyn BlobStore,
    retry: &RetryPolicy,
    path: &str,
) -> Result<Vec<u8>, OpError> {
    let fetched = retry_with_backoff(retry, || blob.fetch(path)).await?;
    fetched.ok_or_else(|| OpError::SourceMissing(path.to_string()))
}

/// Merge tolerates partial source loss: missing or unreadable sources are
/// reported as warnings and the rest still merge. Only a merge that ends
/// up with zero usable pages fails hard.
async fn merge_op(
    blob: &dyn BlobStore,
    retry: &RetryPolicy,
    source_files: &[String],
    output_name: &str,
) -> Result<InstructionOutput, OpError> {
    if source_files.is_empty() {
        return Err(OpError::Pdf(PdfOpError::InvalidInstruction(
            "merge needs at least one source file".into(),
        )));
    }

    let mut found = Vec::new();
    let mut warnings = Vec::new();

    for name in source_files {
        match retry_with_backoff(retry, || blob.fetch(name)).await {
            Ok(Some(bytes)) => match page_count(&bytes) {
                Ok(pages) if pages > 0 => found.push(bytes),
                Ok(_) => warnings.push(format!("{output_name}: source {name} has no pages")),
                Err(e) => {
                    warnings.push(format!("{output_name}: source {name} could not be read: {e}"))
                }
            },
            Ok(None) => warnings.push(format!("{output_name}: missing source file {name}")),
            Err(e) => warnings.push(format!("{output_name}: fetch of {name} failed: {e}")),
        }
    }

    if found.is_empty() {
        return Err(OpError::NoValidPages);
    }

    let merged = merge_documents(found)?;
    Ok(InstructionOutput {
        outputs: vec![(output_name.to_string(), merged)],
        warnings,
    })
}

/// Split produces one output per range, independent of the others; a
/// failure in one range is recorded as a warning and never blocks its
/// siblings.
async fn split_op(
    blob: &dyn BlobStore,
    retry: &RetryPolicy,
    source_file: &str,
    page_ranges: &[(u32, u32)],
    output_names: &[String],
) -> Result<InstructionOutput, OpError> {
    let bytes = fetch_required(blob, retry, source_file).await?;

    let mut result = InstructionOutput::default();
    for (i, &(start, end)) in page_ranges.iter().enumerate() {
        let name = output_names
            .get(i)
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{}_part{}.pdf", file_stem(source_file), i + 1));

        let indices: Vec<u32> = if start > end {
            Vec::new()
        } else {
            (start..=end).collect()
        };

        match select_pages(&bytes, &indices) {
            Ok(output) => result.outputs.push((name, output)),
            Err(e) => result
                .warnings
                .push(format!("{name}: range {start}-{end} failed: {e}")),
        }
    }

    Ok(result)
}
