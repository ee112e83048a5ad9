//! Page-level operations: selection, deletion, re-serialization
//!
//! Everything here works on byte buffers and is tolerant of out-of-range
//! page indices: an index outside `[0, page_count)` is dropped, never an
//! error. Indices are 0-based throughout.

use lopdf::{Dictionary, Document, Object, StringFormat};

use crate::error::PdfOpError;
use crate::pagetree::{page_refs, rebuild_page_tree};

fn load(bytes: &[u8]) -> Result<Document, PdfOpError> {
    Document::load_mem(bytes).map_err(|e| PdfOpError::ParseError(e.to_string()))
}

fn save(mut doc: Document) -> Result<Vec<u8>, PdfOpError> {
    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfOpError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Build a new document whose pages are exactly `order`, in that order.
///
/// Duplicate indices are legal (the page appears twice), omitted indices
/// drop the page, and out-of-range indices are skipped. An empty selection
/// yields a valid 0-page document.
pub fn select_pages(bytes: &[u8], order: &[u32]) -> Result<Vec<u8>, PdfOpError> {
    let mut doc = load(bytes)?;
    let pages = page_refs(&doc);

    let mut selected = Vec::with_capacity(order.len());
    let mut seen = std::collections::HashSet::new();
    for &index in order {
        let Some(&page_id) = pages.get(index as usize) else {
            continue;
        };
        if seen.insert(page_id) {
            selected.push(page_id);
        } else {
            // A repeated page gets its own page object so every kid in the
            // rebuilt tree is a distinct reference.
            let copy = doc
                .get_object(page_id)
                .map_err(|e| PdfOpError::OperationError(e.to_string()))?
                .clone();
            selected.push(doc.add_object(copy));
        }
    }

    rebuild_page_tree(&mut doc, selected)?;
    doc.prune_objects();
    save(doc)
}

/// Remove the given pages from the document.
///
/// Indices are removed in descending numeric order so an earlier removal
/// never shifts the position of a page still to be removed. Out-of-range
/// and duplicate indices are ignored.
pub fn delete_pages(bytes: &[u8], pages_to_delete: &[u32]) -> Result<Vec<u8>, PdfOpError> {
    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len() as u32;

    let mut doomed: Vec<u32> = pages_to_delete
        .iter()
        .copied()
        .filter(|&index| index < page_count)
        .collect();
    doomed.sort_unstable();
    doomed.dedup();

    for &index in doomed.iter().rev() {
        // lopdf numbers pages from 1
        doc.delete_pages(&[index + 1]);
    }

    doc.prune_objects();
    save(doc)
}

/// Re-serialize a document under fresh descriptive metadata.
///
/// The page tree is rebuilt flat and the old document information
/// dictionary is dropped, so whatever metadata the source carried does not
/// survive. Title is set to `title`; Producer and Creator identify this
/// engine.
pub fn rewrite_document(bytes: &[u8], title: &str) -> Result<Vec<u8>, PdfOpError> {
    let mut doc = load(bytes)?;
    let pages = page_refs(&doc);

    rebuild_page_tree(&mut doc, pages)?;
    doc.trailer.remove(b"Info");
    doc.prune_objects();
    set_document_info(&mut doc, title);
    save(doc)
}

fn set_document_info(doc: &mut Document, title: &str) {
    let mut info = Dictionary::new();
    info.set(
        "Title",
        Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
    );
    info.set(
        "Producer",
        Object::String(b"pdfbatch".to_vec(), StringFormat::Literal),
    );
    info.set(
        "Creator",
        Object::String(b"pdfbatch".to_vec(), StringFormat::Literal),
    );
    let info_id = doc.add_object(Object::Dictionary(info));
    doc.trailer.set("Info", Object::Reference(info_id));
}

/// File name with its extension stripped, for document titles.
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
