//! PDF merging functionality using lopdf
//!
//! Pages are appended as they are: objects are renumbered and moved into a
//! new page tree, content streams and images are never decoded.

use std::collections::BTreeMap;
use std::path::PathBuf;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;
use crate::error::{Error, Result};
use crate::pdf::create::save_new;

/// Options for merging PDFs
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Input PDF file paths in the order they should be merged
    pub input_paths: Vec<PathBuf>,
    /// Output PDF file path; must not exist yet
    pub output_path: PathBuf,
}

/// Whether `object` is a document catalog or page tree node
///
/// Those are rebuilt for the merged document, so the inputs' copies are
/// dropped instead of carried along as orphans.
fn is_document_structure(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type").and_then(Object::as_name),
            Ok(b"Catalog") | Ok(b"Pages")
        ),
        _ => false,
    }
}

/// Merge multiple PDF files into a single PDF
///
/// Based on the lopdf merge example:
/// https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs
///
/// # Example
///
/// ```no_run
/// use bind_pdf::pdf::{MergeOptions, merge_pdfs};
/// use std::path::PathBuf;
///
/// let options = MergeOptions {
///     input_paths: vec![
///         PathBuf::from("part-0.pdf"),
///         PathBuf::from("part-1.pdf"),
///     ],
///     output_path: PathBuf::from("merged.pdf"),
/// };
///
/// merge_pdfs(&options).expect("Failed to merge");
/// ```
pub fn merge_pdfs(options: &MergeOptions) -> Result<()> {
    if options.input_paths.is_empty() {
        return Err(Error::General("No input files provided".to_string()));
    }

    // Validate all input files exist
    for path in &options.input_paths {
        if !path.exists() {
            return Err(Error::FileNotFound(path.clone()));
        }
    }

    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    // Documents are loaded one at a time; only their objects are kept
    for path in &options.input_paths {
        let mut doc = Document::load(path)?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(Error::EmptyPdf(path.clone()));
        }

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages() is keyed by page number, so this keeps page order
        page_ids.extend(doc.get_pages().into_values());

        objects.extend(
            doc.objects
                .into_iter()
                .filter(|(_, object)| !is_document_structure(object)),
        );

        debug!(input = %path.display(), pages = pages.len(), "appended pages");
    }

    let mut merged_doc = Document::with_version("1.5");
    merged_doc.objects.extend(objects);

    // New IDs must come after every renumbered input object
    merged_doc.max_id = max_id - 1;

    let pages_id = merged_doc.new_object_id();

    let kids: Vec<Object> = page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));

    let catalog_id = merged_doc.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged_doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged_doc.objects.insert(pages_id, Object::Dictionary(pages_object));
    merged_doc.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = merged_doc.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    merged_doc.compress();
    save_new(&mut merged_doc, &options.output_path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_merge_options_creation() {
        let options = MergeOptions {
            input_paths: vec![
                PathBuf::from("part-0.pdf"),
                PathBuf::from("part-1.pdf"),
            ],
            output_path: PathBuf::from("merged.pdf"),
        };

        assert_eq!(options.input_paths.len(), 2);
        assert_eq!(options.output_path, Path::new("merged.pdf"));
    }

    #[test]
    fn test_structure_objects_are_detected() {
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));

        assert!(is_document_structure(&Object::Dictionary(catalog)));
        assert!(is_document_structure(&Object::Dictionary(pages)));
        assert!(!is_document_structure(&Object::Dictionary(page)));
        assert!(!is_document_structure(&Object::Integer(3)));
    }

    #[test]
    fn test_merge_empty_input_list() {
        let options = MergeOptions {
            input_paths: vec![],
            output_path: PathBuf::from("never-written.pdf"),
        };

        let result = merge_pdfs(&options);
        assert!(matches!(result, Err(Error::General(_))));
    }

    // Merges of real chunk files are covered in tests/integration.rs
}
