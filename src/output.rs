//! Output path resolution
//!
//! The PDF for a folder is written next to it, named after it. An existing
//! file is never replaced: `Folder.pdf`, then `Folder (2).pdf`,
//! `Folder (3).pdf`, and so on.

use std::path::{Path, PathBuf};
use crate::error::{Error, Result};

/// First unused `<base_name>.pdf` / `<base_name> (N).pdf` in `output_dir`
///
/// Existence is checked at call time; resolve again for every job.
pub fn next_available_pdf_path(output_dir: &Path, base_name: &str) -> PathBuf {
    let base_path = output_dir.join(format!("{}.pdf", base_name));
    if !base_path.exists() {
        return base_path;
    }

    (2u64..)
        .map(|counter| output_dir.join(format!("{} ({}).pdf", base_name, counter)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base_path)
}

/// Resolve the output PDF for a folder: `<parent>/<folder name>.pdf`
pub fn output_path_for_folder(folder: &Path) -> Result<PathBuf> {
    let base_name = folder
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::General(format!("Folder has no usable name: {}", folder.display())))?;

    let output_dir = match folder.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    Ok(next_available_pdf_path(output_dir, base_name))
}
