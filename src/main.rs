//! CLI for footnote-tools - normalize research-report citations to
//! Markdown footnotes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use footnote_tools::{batch, BatchError, Options, Patterns, RunSummary};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Normalize research-report citations to Markdown footnotes
#[derive(Parser)]
#[command(name = "footnote-tools")]
#[command(version)]
#[command(after_help = "\
Examples:
  footnote-tools report.md
  footnote-tools --dry-run report.md
  footnote-tools --check --recursive ./deep-research/
  footnote-tools --force converted-report.md

Supported input formats: GPT reports ([[n]](URL) markers) and Gemini
reports ( n。 markers with a numbered reference list). Already-converted
files are skipped unless --force is given.")]
struct Cli {
    /// Markdown file or directory to process
    path: PathBuf,

    /// Preview changes without writing
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Check file format and citation integrity without processing
    #[arg(short, long)]
    check: bool,

    /// Re-process files even if already converted
    #[arg(short, long)]
    force: bool,

    /// Process subdirectories recursively
    #[arg(short, long)]
    recursive: bool,

    /// Show detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Emit per-file reports and the summary as JSON
    #[arg(long)]
    json: bool,
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — target path missing or not a file/directory
    Path(String),
    /// Exit 15 — cannot render output
    Output(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Path(_) => 10,
            AppError::Output(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Path(msg) => {
                write!(f, "{}\n  hint: verify the target path is correct", msg)
            }
            AppError::Output(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<BatchError> for AppError {
    fn from(e: BatchError) -> Self {
        AppError::Path(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.dry_run);

    match run(&cli) {
        Ok(summary) => {
            // Skips are not failures; only hard per-file errors are.
            if summary.errors > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary, AppError> {
    let patterns = Patterns::default();
    let options = Options {
        dry_run: cli.dry_run,
        check: cli.check,
        force: cli.force,
        recursive: cli.recursive,
    };

    let (reports, summary) = batch::run(&cli.path, &options, &patterns)?;

    if cli.json {
        let doc = serde_json::json!({ "files": reports, "summary": summary });
        let rendered = serde_json::to_string_pretty(&doc)
            .map_err(|e| AppError::Output(format!("failed to render JSON report: {}", e)))?;
        println!("{}", rendered);
    } else {
        for report in &reports {
            println!("{}", report);
        }
        if cli.path.is_dir() {
            println!("{}", summary);
        }
    }

    Ok(summary)
}

// Dry runs default to info so the change preview is visible without
// --verbose.
fn init_tracing(verbose: bool, dry_run: bool) {
    let default_level = if verbose {
        "debug"
    } else if dry_run {
        "info"
    } else {
        "warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
