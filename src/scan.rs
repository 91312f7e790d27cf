//! Folder scanning and natural filename ordering

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{Error, Result};

/// A JPEG file found directly inside a scanned folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    path: PathBuf,
    name: String,
}

impl ImageFile {
    /// Full path to the image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, used for ordering
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Images of one folder in page order
///
/// The order is fixed at scan time and determines the page order of the PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedImageSet {
    images: Vec<ImageFile>,
}

impl OrderedImageSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[ImageFile] {
        &self.images
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageFile> {
        self.images.iter()
    }

    /// File names in page order
    pub fn names(&self) -> Vec<&str> {
        self.images.iter().map(ImageFile::name).collect()
    }
}

impl<'a> IntoIterator for &'a OrderedImageSet {
    type Item = &'a ImageFile;
    type IntoIter = std::slice::Iter<'a, ImageFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

/// A maximal run of decimal digits, compared by numeric value
///
/// Leading zeros are stripped so runs of any length compare without overflow:
/// a shorter significant part is always the smaller number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitRun(String);

impl DigitRun {
    fn new(digits: &str) -> Self {
        let significant = digits.trim_start_matches('0');
        DigitRun(significant.to_string())
    }
}

impl Ord for DigitRun {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for DigitRun {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric part of a sort key
///
/// Names without digits sort after every numbered name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Numbers {
    Runs(Vec<DigitRun>),
    Unnumbered,
}

/// Natural sort key: digit runs first, then the lowercased name
///
/// The raw name is the last component so names differing only in case
/// still get a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey {
    numbers: Numbers,
    lowered: String,
    raw: String,
}

/// Build the natural sort key for a file name
///
/// # Example
///
/// ```
/// use bind_pdf::scan::natural_sort_key;
///
/// assert!(natural_sort_key("img2.jpg") < natural_sort_key("img10.jpg"));
/// assert!(natural_sort_key("img10.jpg") < natural_sort_key("cover.jpg"));
/// ```
pub fn natural_sort_key(name: &str) -> NaturalKey {
    let mut runs = Vec::new();
    let mut start = None;

    for (i, c) in name.char_indices() {
        match (c.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(DigitRun::new(&name[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(DigitRun::new(&name[s..]));
    }

    let numbers = if runs.is_empty() {
        Numbers::Unnumbered
    } else {
        Numbers::Runs(runs)
    };

    NaturalKey {
        numbers,
        lowered: name.to_lowercase(),
        raw: name.to_string(),
    }
}

/// Whether a path has a `.jpg` or `.jpeg` extension, in any letter case
pub fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// List the JPEG files directly inside `folder` in natural order
///
/// Subdirectories are not descended into. Names that are not valid UTF-8
/// are skipped.
pub fn scan_folder(folder: &Path) -> Result<OrderedImageSet> {
    if !folder.is_dir() {
        return Err(Error::NotADirectory(folder.to_path_buf()));
    }

    let mut keyed = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() || !is_jpeg_path(&path) {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                debug!(path = %path.display(), "skipping non UTF-8 file name");
                continue;
            }
        };

        keyed.push((natural_sort_key(&name), ImageFile { path, name }));
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    debug!(folder = %folder.display(), count = keyed.len(), "scanned folder");

    Ok(OrderedImageSet {
        images: keyed.into_iter().map(|(_, image)| image).collect(),
    })
}
