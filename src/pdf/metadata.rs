//! PDF metadata extraction

use std::path::Path;
use lopdf::{Document, Object, ObjectId};
use crate::error::{Error, Result};

/// Count pages by reading the Count field from the Pages dictionary
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc.catalog()?;

    let pages_id = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("Pages is not a reference".to_string())),
    };

    let pages_dict = doc.get_dictionary(pages_id)?;

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => Ok(*n as usize),
        _ => Err(Error::General("Count is not a valid integer".to_string())),
    }
}

/// Size of a page's MediaBox in points
fn media_box_size(doc: &Document, page_id: ObjectId) -> Result<(f32, f32)> {
    let page = doc.get_dictionary(page_id)?;
    let media_box = page.get(b"MediaBox")?.as_array()?;

    if media_box.len() != 4 {
        return Err(Error::General(format!("Malformed MediaBox on page {:?}", page_id)));
    }

    let mut corners = [0.0f32; 4];
    for (corner, value) in corners.iter_mut().zip(media_box) {
        *corner = value.as_float()?;
    }

    Ok((corners[2] - corners[0], corners[3] - corners[1]))
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Width and height of each page in points, in page order
    pub page_sizes: Vec<(f32, f32)>,
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    let page_sizes = doc
        .get_pages()
        .into_values()
        .map(|page_id| media_box_size(&doc, page_id))
        .collect::<Result<Vec<_>>>()?;

    Ok(PdfMetadata {
        page_count,
        page_sizes,
    })
}

/// Count the number of pages in a PDF file
///
/// This is a quick operation that reads the Count field from the Pages dictionary.
pub fn count_pages(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(page_count)
}
