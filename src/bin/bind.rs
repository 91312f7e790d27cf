//! Bind CLI tool
//!
//! A command-line front end that binds a folder of JPEG images into one PDF.

use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bind_pdf::assemble::{AssembleOptions, Outcome, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_THRESHOLD};
use bind_pdf::pdf::{extract_metadata, DEFAULT_DPI};
use bind_pdf::runlog::{RunLog, DEFAULT_LOG_FILE};
use bind_pdf::scan::scan_folder;
use bind_pdf::session::{unwrap_drop_payload, JobEvent, Session};

/// Bind - Combine the JPEG images of a folder into one PDF
#[derive(Parser)]
#[command(name = "bind")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Create \"Chapter 1.pdf\" next to the folder
    bind create \"scans/Chapter 1\"

    # Create and open the result
    bind create --open scans/chapter2

    # Show the page order without creating anything
    bind scan scans/chapter2

    # Inspect a created PDF
    bind info \"scans/Chapter 1.pdf\"")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a PDF from the JPEG images of a folder
    Create {
        /// Folder holding the images (a brace-wrapped drop payload is accepted)
        folder: String,

        /// Largest image count converted in a single pass
        #[arg(long, default_value_t = DEFAULT_BATCH_THRESHOLD)]
        batch_threshold: usize,

        /// Images per chunk above the threshold
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Density for images that do not record one
        #[arg(long, default_value_t = DEFAULT_DPI)]
        dpi: f32,

        /// File that failures are appended to
        #[arg(long, default_value = DEFAULT_LOG_FILE)]
        log_file: PathBuf,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// List the JPEG images of a folder in page order
    Scan {
        /// Folder holding the images
        folder: String,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,bind_pdf=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Create { folder, batch_threshold, batch_size, dpi, log_file, open } => {
            let options = AssembleOptions { batch_threshold, batch_size, dpi };
            cmd_create(&folder, options, RunLog::new(log_file), open)
        }
        Commands::Scan { folder } => cmd_scan(&folder),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Create the PDF for a folder, reporting progress until the job ends
fn cmd_create(folder: &str, options: AssembleOptions, run_log: RunLog, open: bool) -> Result<()> {
    if options.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    let log_path = run_log.path().to_path_buf();
    let mut session = Session::new(options, run_log);

    let count = session
        .select_dropped(folder)
        .with_context(|| format!("Cannot use {}", folder))?;
    if count == 0 {
        bail!("No JPEG images found in {}", folder);
    }

    let name = session.folder_name().unwrap_or_default();
    eprintln!("Binding {} image{} from {}...", count, if count == 1 { "" } else { "s" }, name);

    session.create_pdf()?;

    let mut outcome = None;
    while let Some(event) = session.wait_event() {
        match event {
            JobEvent::Progress(progress) => {
                eprint!("\r{} / {}", progress.current, progress.total);
                let _ = std::io::stderr().flush();
            }
            JobEvent::Finished(finished) => outcome = Some(finished),
        }
    }
    eprintln!();

    match outcome {
        Some(Outcome::Success { output }) => {
            eprintln!("Created: {}", output.display());
        }
        Some(Outcome::PartialSuccess { output, error }) => {
            eprintln!("Created: {}", output.display());
            eprintln!("Warning: {} (see {})", error, log_path.display());
        }
        Some(Outcome::Failure { output, error }) => {
            let output_info = output
                .map(|path| format!("\nOutput path: {}", path.display()))
                .unwrap_or_default();
            bail!(
                "Failed to create PDF:\n{}{}\n\nCheck {} for details.",
                error,
                output_info,
                log_path.display()
            );
        }
        None => bail!("PDF creation ended without a result"),
    }

    if open {
        session.open_last_output()?;
    }

    Ok(())
}

/// Print the ordered images of a folder
fn cmd_scan(folder: &str) -> Result<()> {
    let folder = unwrap_drop_payload(folder);
    let images = scan_folder(&folder)
        .with_context(|| format!("Cannot scan {}", folder.display()))?;

    println!("Folder: {}", folder.display());
    println!("Images: {}", images.len());
    for (index, image) in images.iter().enumerate() {
        println!("{:>5}  {}", index + 1, image.name());
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    let metadata = extract_metadata(&input)
        .with_context(|| format!("Cannot read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    for (index, (width, height)) in metadata.page_sizes.iter().enumerate() {
        println!("{:>5}  {:.1} x {:.1} pt", index + 1, width, height);
    }

    Ok(())
}
