//! Archive assembly
//!
//! Collects every produced `(name, bytes)` output into one deflate
//! compressed zip, built incrementally so pending memory is bounded by the
//! chunk the runner is currently settling, not the whole batch.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use pdfbatch_core::sanitize_name;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive write failed: {0}")]
    Write(String),
}

/// Incremental zip builder keyed by sanitized entry name.
///
/// A name produced twice is disambiguated with an `_n` suffix before the
/// extension rather than silently overwritten.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    used_names: HashSet<String>,
    entries: usize,
    raw_bytes: u64,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            used_names: HashSet::new(),
            entries: 0,
            raw_bytes: 0,
        }
    }

    fn options() -> SimpleFileOptions {
        // Inputs are already-compressed PDF streams; a medium deflate level
        // favors throughput over the last few percent of ratio.
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(6))
    }

    fn unique_name(&mut self, name: &str) -> String {
        let clean = sanitize_name(name);
        if self.used_names.insert(clean.clone()) {
            return clean;
        }

        let (stem, ext) = match clean.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
            _ => (clean, String::new()),
        };
        let mut n = 1;
        loop {
            let candidate = format!("{stem}_{n}{ext}");
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Append one output. Returns the entry name actually used, which may
    /// carry a disambiguation suffix.
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<String, ArchiveError> {
        let entry_name = self.unique_name(name);
        self.writer
            .start_file(entry_name.as_str(), Self::options())
            .map_err(|e| ArchiveError::Write(e.to_string()))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| ArchiveError::Write(e.to_string()))?;
        self.entries += 1;
        self.raw_bytes += bytes.len() as u64;
        Ok(entry_name)
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Uncompressed byte total of everything added so far.
    pub fn raw_bytes(&self) -> u64 {
        self.raw_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Finalize the central directory and hand back the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| ArchiveError::Write(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
