//! PDF merge
//!
//! Appends the pages of every source document, in list order, into one
//! output document.
//!
//! The algorithm:
//! 1. If empty, return an error (the caller decides whether that is a hard
//!    or soft condition)
//! 2. If a single document, return it as-is
//! 3. Use the first document as the destination
//! 4. For each further source:
//!    a. Calculate an id offset to avoid object id conflicts
//!    b. Import all objects with remapped ids
//!    c. Append its pages to the destination page list
//! 5. Rebuild the destination page tree, compress, serialize

use std::collections::BTreeMap;

use lopdf::Document;

use crate::error::PdfOpError;
use crate::pagetree::{page_refs, rebuild_page_tree, remap_object_refs};

/// Merge already-fetched documents into one. Callers that tolerate missing
/// or unreadable sources filter them out before calling this.
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfOpError> {
    if documents.is_empty() {
        return Err(PdfOpError::NoValidPages);
    }

    // Single document - nothing to merge
    if documents.len() == 1 {
        return Ok(documents.into_iter().next().unwrap_or_default());
    }

    let mut loaded_docs = Vec::new();
    for (i, doc_bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(doc_bytes).map_err(|e| {
            PdfOpError::ParseError(format!("Failed to load document {}: {}", i, e))
        })?;
        loaded_docs.push(doc);
    }

    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = page_refs(&dest);

    for source in loaded_docs.into_iter() {
        let source_pages = page_refs(&source);
        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            let remapped_object = remap_object_refs(object, id_offset);
            remapped_objects.insert(new_id, remapped_object);
        }

        for (id, object) in remapped_objects {
            dest.objects.insert(id, object);
        }

        for old_page_ref in source_pages {
            let new_page_ref = (old_page_ref.0 + id_offset, old_page_ref.1);
            dest_page_refs.push(new_page_ref);
        }

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    rebuild_page_tree(&mut dest, dest_page_refs)?;
    dest.max_id = dest_max_id;
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| PdfOpError::OperationError(format!("Failed to save merged PDF: {}", e)))?;

    Ok(buffer)
}
