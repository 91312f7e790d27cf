//! Bind Library
//!
//! Binds the JPEG images of a folder into a single PDF, one page per image,
//! in natural filename order. This library provides functionality to:
//! - Scan a folder for JPEG files and order them numerically
//! - Resolve a collision-free output path next to the folder
//! - Convert images to PDF in one pass, or in chunks merged page by page
//! - Run a conversion in the background and report progress
//!
//! # Example
//!
//! ```no_run
//! use bind_pdf::assemble::{AssembleOptions, ConversionJob, assemble};
//! use bind_pdf::scan::scan_folder;
//! use std::path::Path;
//!
//! let folder = Path::new("scans/Chapter 1");
//! let images = scan_folder(folder).expect("Failed to scan folder");
//! let job = ConversionJob::for_folder(folder, images).expect("Failed to resolve output");
//!
//! assemble(&job, &AssembleOptions::default(), |progress| {
//!     eprintln!("{} / {}", progress.current, progress.total);
//! })
//! .expect("Failed to create PDF");
//! ```

pub mod assemble;
pub mod error;
pub mod output;
pub mod pdf;
pub mod runlog;
pub mod scan;
pub mod session;

// Re-export commonly used items
pub use assemble::{AssembleOptions, ConversionJob, Outcome, Progress};
pub use error::{Error, Result};
pub use scan::{ImageFile, OrderedImageSet};
pub use session::{Session, SessionState};
