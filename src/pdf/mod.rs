//! PDF manipulation module

pub mod create;
pub mod jpeg;
pub mod merge;
pub mod metadata;

// Re-export commonly used items
pub use create::{build_image_document, images_to_pdf, inspect_jpeg, save_new, ImagePdfOptions, JpegInfo, DEFAULT_DPI};
pub use jpeg::{read_markers, JpegColorSpace, JpegMarkers};
pub use merge::{merge_pdfs, MergeOptions};
pub use metadata::{count_pages, extract_metadata, PdfMetadata};
