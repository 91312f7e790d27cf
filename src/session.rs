//! Interactive session: folder selection, one background job, event dispatch
//!
//! A [`Session`] is owned by the interactive thread. Creating a PDF moves the
//! work onto a background thread, which only sends [`JobEvent`]s back over a
//! channel. The interactive thread applies them to the session when it calls
//! [`Session::poll_events`] or [`Session::wait_event`], so session state is
//! never touched from the worker.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};
use crate::assemble::{run_job, AssembleOptions, Outcome, Progress};
use crate::error::{Error, Result};
use crate::runlog::RunLog;
use crate::scan::{scan_folder, OrderedImageSet};

/// Message from the background job to the interactive thread
#[derive(Debug)]
pub enum JobEvent {
    Progress(Progress),
    Finished(Outcome),
}

/// What the interface should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No folder selected
    Idle,
    /// Folder selected but it holds no JPEG images
    NoImages,
    /// Folder selected, ready to create a PDF
    Ready { images: usize },
    /// A job is running
    Processing,
    /// The last job produced this file
    Completed { output: PathBuf },
}

struct RunningJob {
    events: Receiver<JobEvent>,
    worker: JoinHandle<()>,
}

/// Selected folder, cached scan result and the running job, if any
pub struct Session {
    options: AssembleOptions,
    run_log: RunLog,
    folder: Option<PathBuf>,
    images: OrderedImageSet,
    job: Option<RunningJob>,
    last_progress: Option<Progress>,
    last_output: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(AssembleOptions::default(), RunLog::default())
    }
}

impl Session {
    pub fn new(options: AssembleOptions, run_log: RunLog) -> Self {
        Self {
            options,
            run_log,
            folder: None,
            images: OrderedImageSet::default(),
            job: None,
            last_progress: None,
            last_output: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.job.is_some() {
            SessionState::Processing
        } else if let Some(output) = &self.last_output {
            SessionState::Completed { output: output.clone() }
        } else if self.folder.is_none() {
            SessionState::Idle
        } else if self.images.is_empty() {
            SessionState::NoImages
        } else {
            SessionState::Ready { images: self.images.len() }
        }
    }

    pub fn is_processing(&self) -> bool {
        self.job.is_some()
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    /// Display name of the selected folder
    pub fn folder_name(&self) -> Option<String> {
        self.folder
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn images(&self) -> &OrderedImageSet {
        &self.images
    }

    pub fn last_progress(&self) -> Option<Progress> {
        self.last_progress
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    /// Select a folder and cache its ordered images
    ///
    /// A path that is not a directory is rejected without changing the
    /// session. Returns the number of images found.
    pub fn select_folder(&mut self, path: &Path) -> Result<usize> {
        if self.is_processing() {
            return Err(Error::General("A PDF is already being created".to_string()));
        }
        if !path.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let folder = absolute_folder(path)?;
        let images = scan_folder(&folder)?;
        info!(folder = %folder.display(), images = images.len(), "selected folder");

        self.folder = Some(folder);
        self.images = images;
        self.last_progress = None;
        self.last_output = None;

        Ok(self.images.len())
    }

    /// Select the folder named by a drag-and-drop payload
    pub fn select_dropped(&mut self, payload: &str) -> Result<usize> {
        self.select_folder(&unwrap_drop_payload(payload))
    }

    /// Forget the folder and the last result
    ///
    /// Does nothing while a job is running.
    pub fn reset(&mut self) -> bool {
        if self.is_processing() {
            return false;
        }

        self.folder = None;
        self.images = OrderedImageSet::default();
        self.last_progress = None;
        self.last_output = None;
        true
    }

    /// Start creating the PDF for the selected folder in the background
    ///
    /// Returns `Ok(false)` without doing anything if a job is already
    /// running. The output path is resolved by the job itself.
    pub fn create_pdf(&mut self) -> Result<bool> {
        if self.is_processing() {
            debug!("create request ignored, a job is running");
            return Ok(false);
        }

        let folder = self.folder.clone().ok_or(Error::NoFolderSelected)?;
        if self.images.is_empty() {
            return Err(Error::NoImages(folder));
        }

        let images = self.images.clone();
        let options = self.options.clone();
        let run_log = self.run_log.clone();
        let (tx, rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("bind-convert".to_string())
            .spawn(move || {
                let progress_tx = tx.clone();
                let outcome = run_job(&folder, images, &options, &run_log, |progress| {
                    let _ = progress_tx.send(JobEvent::Progress(progress));
                });
                let _ = tx.send(JobEvent::Finished(outcome));
            })?;

        self.last_progress = None;
        self.last_output = None;
        self.job = Some(RunningJob { events: rx, worker });

        Ok(true)
    }

    /// Apply and return every event already sent by the job, without blocking
    pub fn poll_events(&mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();

        while let Some(job) = &self.job {
            let event = match job.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.lost_worker(),
            };
            events.push(self.apply(event));
        }

        events
    }

    /// Block until the job sends its next event, then apply and return it
    ///
    /// Returns `None` when no job is running.
    pub fn wait_event(&mut self) -> Option<JobEvent> {
        let job = self.job.as_ref()?;
        let event = match job.events.recv() {
            Ok(event) => event,
            Err(_) => self.lost_worker(),
        };
        Some(self.apply(event))
    }

    /// The worker hung up without reporting an outcome, e.g. it panicked
    fn lost_worker(&self) -> JobEvent {
        let error = Error::General("PDF creation stopped unexpectedly".to_string());
        error!(error = %error, "conversion worker exited without a result");
        self.run_log.append_failure(&error, None);
        JobEvent::Finished(Outcome::Failure { output: None, error })
    }

    fn apply(&mut self, event: JobEvent) -> JobEvent {
        match &event {
            JobEvent::Progress(progress) => {
                self.last_progress = Some(*progress);
            }
            JobEvent::Finished(outcome) => {
                if let Some(job) = self.job.take() {
                    if job.worker.join().is_err() {
                        error!("conversion worker panicked");
                    }
                }
                if let Some(output) = outcome.output() {
                    self.last_output = Some(output.to_path_buf());
                    let total = self.images.len();
                    self.last_progress = Some(Progress::new(total, total));
                }
            }
        }
        event
    }

    /// Open the last produced PDF with the system default application
    pub fn open_last_output(&self) -> Result<()> {
        match &self.last_output {
            Some(path) if path.exists() => open_path(path),
            Some(path) => Err(Error::FileNotFound(path.clone())),
            None => Err(Error::General("No PDF has been created yet".to_string())),
        }
    }
}

/// Absolute form of `path` with `.` and `..` removed
///
/// Symlinks are kept as given, so the folder name and output location
/// follow the path the user chose.
fn absolute_folder(path: &Path) -> io::Result<PathBuf> {
    let mut folder = PathBuf::new();
    for component in std::path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folder.pop();
            }
            other => folder.push(other),
        }
    }
    Ok(folder)
}

/// Path carried by a drag-and-drop payload
///
/// Paths containing spaces arrive wrapped in braces, e.g. `{/Users/me/My Scans}`.
pub fn unwrap_drop_payload(payload: &str) -> PathBuf {
    let payload = payload.trim();
    let unwrapped = payload
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(payload);
    PathBuf::from(unwrapped)
}

/// Open a file with the system default application
pub fn open_path(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}
