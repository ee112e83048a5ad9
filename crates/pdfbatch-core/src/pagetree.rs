//! Page tree plumbing shared by the merge and page-level operations.

use lopdf::{Document, Object, ObjectId};

use crate::error::PdfOpError;

/// All page object references of a document, in page order.
pub(crate) fn page_refs(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Recursively remap object references in an object by an id offset.
pub(crate) fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the document's root Pages node at exactly the given page
/// references, in order. The Kids array and Count are rewritten; objects no
/// longer reachable are left for `prune_objects` to collect.
pub(crate) fn rebuild_page_tree(
    doc: &mut Document,
    page_refs: Vec<ObjectId>,
) -> Result<(), PdfOpError> {
    let root_obj = doc
        .trailer
        .get(b"Root")
        .map_err(|_| PdfOpError::OperationError("No Root in trailer".into()))?;

    let catalog_id = root_obj
        .as_reference()
        .map_err(|_| PdfOpError::OperationError("Root is not a reference".into()))?;

    let catalog = doc
        .objects
        .get(&catalog_id)
        .ok_or_else(|| PdfOpError::OperationError("Catalog not found".into()))?
        .as_dict()
        .map_err(|_| PdfOpError::OperationError("Invalid catalog".into()))?;

    let pages_obj = catalog
        .get(b"Pages")
        .map_err(|_| PdfOpError::OperationError("No Pages in catalog".into()))?;

    let pages_id = pages_obj
        .as_reference()
        .map_err(|_| PdfOpError::OperationError("Pages is not a reference".into()))?;

    // Every page must point back at the root Pages node, otherwise pages
    // lifted out of nested tree nodes keep stale Parent references.
    for &page_ref in &page_refs {
        if let Some(Object::Dictionary(ref mut page_dict)) = doc.objects.get_mut(&page_ref) {
            page_dict.set("Parent", Object::Reference(pages_id));
        }
    }

    if let Some(Object::Dictionary(ref mut pages_dict)) = doc.objects.get_mut(&pages_id) {
        let kids = page_refs
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
    } else {
        return Err(PdfOpError::OperationError(
            "Invalid pages dictionary".into(),
        ));
    }

    Ok(())
}
