//! Integration tests for the bind library

use bind_pdf::assemble::{run_job, AssembleOptions, Outcome, Progress};
use bind_pdf::pdf::{count_pages, extract_metadata, images_to_pdf, merge_pdfs, ImagePdfOptions, MergeOptions, DEFAULT_DPI};
use bind_pdf::runlog::RunLog;
use bind_pdf::scan::scan_folder;
use bind_pdf::session::{JobEvent, Session, SessionState};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a JPEG of the given pixel size; widths tell pages apart later
fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([180, 40, 90])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .expect("Failed to encode JPEG");

    let path = dir.join(name);
    fs::write(&path, bytes).expect("Failed to write JPEG");
    path
}

/// Create `<temp>/<name>/` and return (temp dir, folder)
fn image_folder(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let folder = temp_dir.path().join(name);
    fs::create_dir(&folder).expect("Failed to create image folder");
    (temp_dir, folder)
}

/// Page widths in points, in page order
fn page_widths(pdf: &Path) -> Vec<f32> {
    extract_metadata(pdf)
        .expect("Failed to read PDF")
        .page_sizes
        .into_iter()
        .map(|(width, _)| width)
        .collect()
}

/// Pixel width that becomes `points` wide at the default density
fn px_for_points(points: f32) -> u32 {
    (points * DEFAULT_DPI / 72.0) as u32
}

/// Names in the output directory other than the image folder
fn output_dir_entries(temp_dir: &TempDir, folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(temp_dir.path())
        .expect("Failed to list output directory")
        .map(|entry| entry.expect("Failed to read entry").path())
        .filter(|path| path != folder)
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn run(folder: &Path, options: &AssembleOptions, log: &RunLog) -> (Outcome, Vec<Progress>) {
    let images = scan_folder(folder).expect("Failed to scan folder");
    let mut reports = Vec::new();
    let outcome = run_job(folder, images, options, log, |progress| reports.push(progress));
    (outcome, reports)
}

#[test]
fn test_three_images_in_natural_order() {
    let (temp_dir, folder) = image_folder("Folder");
    write_jpeg(&folder, "3.jpg", px_for_points(30.0), 8);
    write_jpeg(&folder, "1.jpg", px_for_points(6.0), 8);
    write_jpeg(&folder, "2.jpg", px_for_points(18.0), 8);
    let log = RunLog::new(temp_dir.path().join("run.log"));

    let (outcome, reports) = run(&folder, &AssembleOptions::default(), &log);

    let output = match outcome {
        Outcome::Success { output } => output,
        other => panic!("Expected success, got {:?}", other),
    };
    assert_eq!(output, temp_dir.path().join("Folder.pdf"));
    assert_eq!(count_pages(&output).expect("Failed to count pages"), 3);
    assert_eq!(page_widths(&output), vec![6.0, 18.0, 30.0]);

    assert_eq!(reports.first(), Some(&Progress::new(0, 3)));
    assert_eq!(reports.last(), Some(&Progress::new(3, 3)));
    assert!(!log.path().exists(), "Nothing should be logged on success");
}

#[test]
fn test_existing_output_is_never_overwritten() {
    let (temp_dir, folder) = image_folder("Folder");
    write_jpeg(&folder, "1.jpg", 16, 16);
    fs::write(temp_dir.path().join("Folder.pdf"), b"older result").expect("Failed to write");
    let log = RunLog::new(temp_dir.path().join("run.log"));

    let (first, _) = run(&folder, &AssembleOptions::default(), &log);
    assert_eq!(first.output(), Some(temp_dir.path().join("Folder (2).pdf").as_path()));

    let (second, _) = run(&folder, &AssembleOptions::default(), &log);
    assert_eq!(second.output(), Some(temp_dir.path().join("Folder (3).pdf").as_path()));

    assert_eq!(
        fs::read(temp_dir.path().join("Folder.pdf")).expect("Failed to read"),
        b"older result"
    );
}

#[test]
fn test_chunked_conversion_keeps_order_and_cleans_up() {
    let (temp_dir, folder) = image_folder("Chunks");
    for n in 1..=7u32 {
        write_jpeg(&folder, &format!("page{}.jpg", n), px_for_points(3.0 * n as f32), 8);
    }
    let options = AssembleOptions {
        batch_threshold: 5,
        batch_size: 3,
        dpi: DEFAULT_DPI,
    };
    let log = RunLog::new(temp_dir.path().join("run.log"));

    let (outcome, reports) = run(&folder, &options, &log);

    let output = outcome.output().expect("Expected an output file").to_path_buf();
    assert!(matches!(outcome, Outcome::Success { .. }));
    assert_eq!(
        page_widths(&output),
        vec![3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0]
    );
    assert_eq!(
        reports,
        vec![
            Progress::new(0, 7),
            Progress::new(3, 7),
            Progress::new(6, 7),
            Progress::new(7, 7),
            Progress::new(7, 7),
        ]
    );
    assert_eq!(output_dir_entries(&temp_dir, &folder), vec!["Chunks.pdf"]);
}

#[test]
fn test_351_images_use_chunks_of_300_and_51() {
    let (temp_dir, folder) = image_folder("Large");
    for n in 1..=351 {
        write_jpeg(&folder, &format!("{}.jpg", n), 8, 8);
    }
    let log = RunLog::new(temp_dir.path().join("run.log"));

    let (outcome, reports) = run(&folder, &AssembleOptions::default(), &log);

    let output = outcome.output().expect("Expected an output file").to_path_buf();
    assert_eq!(count_pages(&output).expect("Failed to count pages"), 351);
    assert_eq!(
        reports,
        vec![
            Progress::new(0, 351),
            Progress::new(300, 351),
            Progress::new(351, 351),
            Progress::new(351, 351),
        ]
    );
    assert_eq!(output_dir_entries(&temp_dir, &folder), vec!["Large.pdf"]);
}

#[test]
fn test_undecodable_image_fails_and_is_logged() {
    let (temp_dir, folder) = image_folder("Broken");
    write_jpeg(&folder, "1.jpg", 8, 8);
    fs::write(folder.join("2.jpg"), b"not really a jpeg").expect("Failed to write");
    let log = RunLog::new(temp_dir.path().join("run.log"));

    let (outcome, _) = run(&folder, &AssembleOptions::default(), &log);

    match &outcome {
        Outcome::Failure { output, .. } => {
            assert_eq!(output.as_deref(), Some(temp_dir.path().join("Broken.pdf").as_path()));
        }
        other => panic!("Expected failure, got {:?}", other),
    }
    assert!(!outcome.is_completed());
    assert!(!temp_dir.path().join("Broken.pdf").exists());

    let logged = fs::read_to_string(log.path()).expect("Run log was not written");
    assert!(logged.contains("Error occurred"));
    assert!(logged.contains("2.jpg"));
}

#[test]
fn test_failed_chunk_leaves_no_temporary_files() {
    let (temp_dir, folder) = image_folder("HalfBroken");
    for n in 1..=4 {
        write_jpeg(&folder, &format!("{}.jpg", n), 8, 8);
    }
    fs::write(folder.join("5.jpg"), b"garbage").expect("Failed to write");
    let options = AssembleOptions {
        batch_threshold: 2,
        batch_size: 2,
        dpi: DEFAULT_DPI,
    };
    let log = RunLog::new(temp_dir.path().join("run.log"));

    let (outcome, reports) = run(&folder, &options, &log);

    assert!(matches!(outcome, Outcome::Failure { .. }));
    assert_eq!(reports.last(), Some(&Progress::new(4, 5)));
    assert_eq!(output_dir_entries(&temp_dir, &folder), vec!["run.log"]);
}

#[test]
fn test_merge_appends_in_input_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let wide = write_jpeg(temp_dir.path(), "wide.jpg", px_for_points(60.0), 8);
    let narrow = write_jpeg(temp_dir.path(), "narrow.jpg", px_for_points(12.0), 8);

    let first = temp_dir.path().join("first.pdf");
    let second = temp_dir.path().join("second.pdf");
    for (images, output) in [(vec![wide.clone(), narrow.clone()], &first), (vec![narrow], &second)] {
        images_to_pdf(&ImagePdfOptions {
            image_paths: images,
            output_path: output.clone(),
            dpi: DEFAULT_DPI,
        })
        .expect("Failed to create input PDF");
    }

    let merged = temp_dir.path().join("merged.pdf");
    merge_pdfs(&MergeOptions {
        input_paths: vec![second.clone(), first.clone()],
        output_path: merged.clone(),
    })
    .expect("Failed to merge PDFs");

    assert_eq!(page_widths(&merged), vec![12.0, 60.0, 12.0]);

    // A second merge onto the same path must not replace it
    let again = merge_pdfs(&MergeOptions {
        input_paths: vec![first],
        output_path: merged.clone(),
    });
    assert!(again.is_err());
    assert_eq!(count_pages(&merged).expect("Failed to count pages"), 3);
}

#[test]
fn test_merge_nonexistent_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let result = merge_pdfs(&MergeOptions {
        input_paths: vec![PathBuf::from("nonexistent.pdf")],
        output_path: temp_dir.path().join("output.pdf"),
    });

    let error = result.expect_err("Should fail with nonexistent file");
    assert!(
        error.to_string().contains("not found"),
        "Error should mention file not found: {}",
        error
    );
}

#[test]
fn test_session_runs_one_job_in_background() {
    let (temp_dir, folder) = image_folder("Album");
    write_jpeg(&folder, "img10.jpg", px_for_points(30.0), 8);
    write_jpeg(&folder, "img2.jpg", px_for_points(12.0), 8);
    write_jpeg(&folder, "img1.jpg", px_for_points(6.0), 8);

    let mut session = Session::new(
        AssembleOptions::default(),
        RunLog::new(temp_dir.path().join("run.log")),
    );
    assert_eq!(session.select_folder(&folder).expect("Failed to select"), 3);
    assert_eq!(session.state(), SessionState::Ready { images: 3 });

    assert!(session.create_pdf().expect("Failed to start job"));
    assert_eq!(session.state(), SessionState::Processing);
    assert!(!session.create_pdf().expect("Second request should be a no-op"));

    let mut finished = None;
    while let Some(event) = session.wait_event() {
        if let JobEvent::Finished(outcome) = event {
            finished = Some(outcome);
        }
    }

    let expected = temp_dir.path().join("Album.pdf");
    assert!(matches!(finished, Some(Outcome::Success { .. })));
    assert_eq!(session.state(), SessionState::Completed { output: expected.clone() });
    assert_eq!(session.last_progress(), Some(Progress::new(3, 3)));
    assert_eq!(page_widths(&expected), vec![6.0, 12.0, 30.0]);

    // Selecting again clears the completed state
    session.select_folder(&folder).expect("Failed to select");
    assert_eq!(session.state(), SessionState::Ready { images: 3 });
}

#[test]
fn test_session_returns_to_ready_after_failure() {
    let (temp_dir, folder) = image_folder("Bad");
    fs::write(folder.join("1.jpg"), b"garbage").expect("Failed to write");

    let mut session = Session::new(
        AssembleOptions::default(),
        RunLog::new(temp_dir.path().join("run.log")),
    );
    session.select_folder(&folder).expect("Failed to select");
    session.create_pdf().expect("Failed to start job");

    let mut events = Vec::new();
    while let Some(event) = session.wait_event() {
        events.push(event);
    }

    assert!(matches!(events.last(), Some(JobEvent::Finished(Outcome::Failure { .. }))));
    assert_eq!(session.state(), SessionState::Ready { images: 1 });
    assert!(session.last_output().is_none());
    assert!(session.open_last_output().is_err());
}

#[cfg(unix)]
#[test]
fn test_symlinked_folder_keeps_its_own_name() {
    use std::os::unix::fs::symlink;

    let (temp_dir, storage) = image_folder("storage");
    let target = storage.join("raw_0001");
    fs::create_dir(&target).expect("Failed to create target folder");
    write_jpeg(&target, "1.jpg", 16, 16);

    let desktop = temp_dir.path().join("Desktop");
    fs::create_dir(&desktop).expect("Failed to create link directory");
    let link = desktop.join("Chapter 1");
    symlink(&target, &link).expect("Failed to create symlink");

    let mut session = Session::new(
        AssembleOptions::default(),
        RunLog::new(temp_dir.path().join("run.log")),
    );
    assert_eq!(session.select_folder(&link).expect("Failed to select"), 1);
    assert_eq!(session.folder_name().as_deref(), Some("Chapter 1"));
    assert_eq!(session.folder(), Some(link.as_path()));

    session.create_pdf().expect("Failed to start job");
    while session.wait_event().is_some() {}

    let expected = desktop.join("Chapter 1.pdf");
    assert_eq!(session.state(), SessionState::Completed { output: expected.clone() });
    assert_eq!(count_pages(&expected).expect("Failed to count pages"), 1);
    assert!(!storage.join("raw_0001.pdf").exists());
}

#[test]
fn test_dot_components_are_removed_from_selection() {
    let (_temp_dir, folder) = image_folder("Scans");
    write_jpeg(&folder, "1.jpg", 8, 8);

    let mut session = Session::default();
    let roundabout = folder.join(".").join("..").join("Scans").join(".");
    session.select_folder(&roundabout).expect("Failed to select");

    assert_eq!(session.folder(), Some(folder.as_path()));
    assert_eq!(session.folder_name().as_deref(), Some("Scans"));
}

#[cfg(unix)]
#[test]
fn test_read_only_output_directory_fails_without_file() {
    use std::os::unix::fs::PermissionsExt;

    let (temp_dir, folder) = image_folder("Locked");
    write_jpeg(&folder, "1.jpg", 8, 8);
    let log_dir = TempDir::new().expect("Failed to create temp directory");
    let log = RunLog::new(log_dir.path().join("run.log"));

    fs::set_permissions(temp_dir.path(), fs::Permissions::from_mode(0o555))
        .expect("Failed to make directory read-only");
    if fs::write(temp_dir.path().join("writable"), b"").is_ok() {
        // Permission bits are not enforced for this user (e.g. root)
        eprintln!("Skipping test: directory permissions are not enforced");
        fs::set_permissions(temp_dir.path(), fs::Permissions::from_mode(0o755))
            .expect("Failed to restore permissions");
        return;
    }

    let (outcome, _) = run(&folder, &AssembleOptions::default(), &log);

    fs::set_permissions(temp_dir.path(), fs::Permissions::from_mode(0o755))
        .expect("Failed to restore permissions");

    match &outcome {
        Outcome::Failure { output, .. } => {
            assert_eq!(output.as_deref(), Some(temp_dir.path().join("Locked.pdf").as_path()));
        }
        other => panic!("Expected failure, got {:?}", other),
    }
    assert!(!temp_dir.path().join("Locked.pdf").exists());
    assert!(fs::read_to_string(log.path()).expect("Run log was not written").contains("Error occurred"));
}
