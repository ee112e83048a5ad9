//! Bulk PDF document operations
//!
//! This crate provides the pure, synchronous half of the batch engine:
//! the instruction data model plus the page-tree algorithms (merge,
//! delete, split/reorder selection, re-serialization) using lopdf.
//!
//! Everything here works on byte buffers in and out; fetching sources,
//! retries, chunking and archiving live in `pdfbatch-engine`.

pub mod error;
pub mod instruction;
pub mod merge;
pub mod pages;
mod pagetree;

pub use error::PdfOpError;
pub use instruction::{sanitize_name, Instruction, OperationKind};
pub use merge::merge_documents;
pub use pages::{delete_pages, file_stem, rewrite_document, select_pages};

/// Parse PDF bytes and return the page count
pub fn page_count(bytes: &[u8]) -> Result<u32, PdfOpError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfOpError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::create_test_pdf;

    #[test]
    fn test_page_count() {
        let pdf = create_test_pdf(7, "Doc");
        assert_eq!(page_count(&pdf).unwrap(), 7);
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        assert!(page_count(b"not a pdf").is_err());
    }
}
