//! Ordered image set to PDF assembly
//!
//! Small sets are converted in a single pass. Sets larger than
//! [`AssembleOptions::batch_threshold`] are split into consecutive chunks of
//! [`AssembleOptions::batch_size`] images; each chunk is converted to its own
//! temporary PDF, and the chunk PDFs are merged page by page in order. This
//! bounds how many images one conversion pass holds in memory.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, error, info, warn};
use crate::error::{Error, Result};
use crate::output::output_path_for_folder;
use crate::pdf::{build_image_document, count_pages, merge_pdfs, save_new, MergeOptions, DEFAULT_DPI};
use crate::runlog::RunLog;
use crate::scan::OrderedImageSet;

/// Largest set converted in a single pass
pub const DEFAULT_BATCH_THRESHOLD: usize = 350;

/// Images per chunk when a set is converted in chunks
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// Options for assembling a PDF
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Sets with at most this many images are converted in one pass
    pub batch_threshold: usize,
    /// Chunk size for larger sets
    pub batch_size: usize,
    /// Density for images that do not record one
    pub dpi: f32,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            dpi: DEFAULT_DPI,
        }
    }
}

/// How a set of images will be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionPlan {
    /// Convert every image straight to the output file
    SinglePass,
    /// Convert each index range to a temporary PDF, then merge
    Chunked(Vec<Range<usize>>),
}

/// Decide between single-pass and chunked conversion for `total` images
pub fn plan_conversion(total: usize, options: &AssembleOptions) -> Result<ConversionPlan> {
    if total <= options.batch_threshold {
        return Ok(ConversionPlan::SinglePass);
    }
    if options.batch_size == 0 {
        return Err(Error::InvalidOption("batch size must be at least 1".to_string()));
    }

    let chunks = (0..total)
        .step_by(options.batch_size)
        .map(|start| start..(start + options.batch_size).min(total))
        .collect();

    Ok(ConversionPlan::Chunked(chunks))
}

/// Conversion progress as (current, total) images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// Completed share in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// One request to turn an image set into a PDF
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub images: OrderedImageSet,
    pub output_path: PathBuf,
}

impl ConversionJob {
    /// Job writing next to `folder`, to a freshly resolved unused path
    pub fn for_folder(folder: &Path, images: OrderedImageSet) -> Result<Self> {
        if images.is_empty() {
            return Err(Error::NoImages(folder.to_path_buf()));
        }

        Ok(Self {
            images,
            output_path: output_path_for_folder(folder)?,
        })
    }

    fn image_paths(&self, range: Range<usize>) -> Vec<&Path> {
        self.images.images()[range]
            .iter()
            .map(|image| image.path())
            .collect()
    }
}

/// Convert `job.images` to a PDF at `job.output_path`
///
/// `progress` is called with `(0, total)` before any work, after the single
/// pass or each chunk with the images done so far, and finally with
/// `(total, total)`.
pub fn assemble<F>(job: &ConversionJob, options: &AssembleOptions, mut progress: F) -> Result<()>
where
    F: FnMut(Progress),
{
    let total = job.images.len();
    if total == 0 {
        return Err(Error::General("No input images provided".to_string()));
    }

    let plan = plan_conversion(total, options)?;
    progress(Progress::new(0, total));

    match plan {
        ConversionPlan::SinglePass => {
            debug!(total, output = %job.output_path.display(), "converting in a single pass");
            let mut doc = build_image_document(&job.image_paths(0..total), options.dpi)?;
            doc.compress();
            save_new(&mut doc, &job.output_path)?;
        }
        ConversionPlan::Chunked(chunks) => {
            debug!(total, chunks = chunks.len(), output = %job.output_path.display(), "converting in chunks");
            let output_dir = job
                .output_path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));

            // Dropping the temp files deletes them, whether or not the merge succeeds
            let mut parts: Vec<NamedTempFile> = Vec::with_capacity(chunks.len());
            for (index, chunk) in chunks.into_iter().enumerate() {
                let end = chunk.end;
                let part = convert_chunk(job, chunk, index, output_dir, options)?;
                parts.push(part);
                progress(Progress::new(end, total));
            }

            let merge = MergeOptions {
                input_paths: parts.iter().map(|part| part.path().to_path_buf()).collect(),
                output_path: job.output_path.clone(),
            };
            let merged = merge_pdfs(&merge);

            for part in parts {
                let path = part.path().to_path_buf();
                if let Err(e) = part.close() {
                    warn!(part = %path.display(), error = %e, "failed to remove chunk file");
                }
            }
            merged?;
        }
    }

    progress(Progress::new(total, total));
    Ok(())
}

/// Convert one chunk of the job to a temporary PDF in `output_dir`
fn convert_chunk(
    job: &ConversionJob,
    chunk: Range<usize>,
    index: usize,
    output_dir: &Path,
    options: &AssembleOptions,
) -> Result<NamedTempFile> {
    debug!(index, start = chunk.start, end = chunk.end, "converting chunk");

    let mut doc = build_image_document(&job.image_paths(chunk), options.dpi)?;
    doc.compress();

    let mut part = Builder::new()
        .prefix(&format!(".bind-part-{}-", index))
        .suffix(".pdf")
        .tempfile_in(output_dir)?;
    {
        let mut writer = BufWriter::new(part.as_file_mut());
        doc.save_to(&mut writer)?;
        writer.flush()?;
    }

    Ok(part)
}

/// How a job ended
#[derive(Debug)]
pub enum Outcome {
    /// The PDF was written completely
    Success { output: PathBuf },
    /// The job failed, but left a non-empty file at the output path
    PartialSuccess { output: PathBuf, error: Error },
    /// The job failed and produced nothing usable
    Failure { output: Option<PathBuf>, error: Error },
}

impl Outcome {
    /// Output file usable by the caller, if any
    pub fn output(&self) -> Option<&Path> {
        match self {
            Outcome::Success { output } | Outcome::PartialSuccess { output, .. } => Some(output.as_path()),
            Outcome::Failure { .. } => None,
        }
    }

    /// Whether the caller should show the completed state
    pub fn is_completed(&self) -> bool {
        !matches!(self, Outcome::Failure { .. })
    }
}

/// Whether a failed job left a non-empty file at `path`
fn has_partial_output(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Run one job to completion, catching every failure
///
/// The output path is resolved here, per job. Failures are written to
/// `run_log` and classified: a non-empty file this job left at the output
/// path turns the failure into [`Outcome::PartialSuccess`].
pub fn run_job<F>(
    folder: &Path,
    images: OrderedImageSet,
    options: &AssembleOptions,
    run_log: &RunLog,
    progress: F,
) -> Outcome
where
    F: FnMut(Progress),
{
    run_job_with(folder, images, run_log, |job| assemble(job, options, progress))
}

fn run_job_with<C>(folder: &Path, images: OrderedImageSet, run_log: &RunLog, convert: C) -> Outcome
where
    C: FnOnce(&ConversionJob) -> Result<()>,
{
    let job = match ConversionJob::for_folder(folder, images) {
        Ok(job) => job,
        Err(error) => {
            error!(folder = %folder.display(), error = %error, "could not start conversion");
            run_log.append_failure(&error, None);
            return Outcome::Failure { output: None, error };
        }
    };

    info!(images = job.images.len(), output = %job.output_path.display(), "creating PDF");

    match convert(&job) {
        Ok(()) => {
            match count_pages(&job.output_path) {
                Ok(pages) => info!(pages, output = %job.output_path.display(), "created PDF"),
                Err(e) => warn!(output = %job.output_path.display(), error = %e, "created PDF could not be read back"),
            }
            Outcome::Success { output: job.output_path }
        }
        Err(error) => {
            error!(output = %job.output_path.display(), error = %error, "failed to create PDF");
            run_log.append_failure(&error, Some(&job.output_path));

            if left_partial_output(&error, &job.output_path) {
                warn!(output = %job.output_path.display(), "keeping partially written PDF");
                Outcome::PartialSuccess { output: job.output_path, error }
            } else {
                Outcome::Failure { output: Some(job.output_path), error }
            }
        }
    }
}

/// Whether a failed job wrote the file now at `output_path`
///
/// A file that appeared at the path after resolution makes `create_new`
/// fail with `AlreadyExists`; that file belongs to someone else.
fn left_partial_output(error: &Error, output_path: &Path) -> bool {
    if matches!(error, Error::Io(e) if e.kind() == io::ErrorKind::AlreadyExists) {
        return false;
    }
    has_partial_output(output_path)
}
