//! Batch driver.
//!
//! The only module with side effects: reads files, writes backups, and
//! rewrites documents in place. Everything else in the crate is a pure
//! transformation over in-memory text.
//!
//! Concurrent invocations against the same files are not supported; the
//! backup-then-write approach is only safe under serial usage.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::detect::{detect_format, FormatKind, Patterns};
use crate::extract::{footnote_counts, footnote_sets};
use crate::integrity;
use crate::report::{Action, FileReport, RunSummary};
use crate::rewrite::convert;

/// Run flags. Check and dry-run both suppress writes; check additionally
/// skips backup creation since nothing is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Compute the conversion but write nothing.
    pub dry_run: bool,
    /// Report format and integrity only.
    pub check: bool,
    /// Re-validate files that are already converted.
    pub force: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
}

/// Errors fatal to the whole run. Per-file problems never surface here;
/// they become `Failed` reports and the batch continues.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a file or directory: {0}")]
    NotAFileOrDirectory(PathBuf),

    #[error("Failed to list directory '{path}': {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Processes a file or directory and aggregates per-file reports.
///
/// Directory entries are processed one at a time in lexicographic path
/// order so output is deterministic across runs.
pub fn run(
    path: &Path,
    options: &Options,
    patterns: &Patterns,
) -> Result<(Vec<FileReport>, RunSummary), BatchError> {
    if !path.exists() {
        return Err(BatchError::NotFound(path.to_path_buf()));
    }

    let reports = if path.is_file() {
        vec![process_file(path, options, patterns)]
    } else if path.is_dir() {
        let files = collect_markdown_files(path, options.recursive)?;
        files
            .iter()
            .map(|file| process_file(file, options, patterns))
            .collect()
    } else {
        return Err(BatchError::NotAFileOrDirectory(path.to_path_buf()));
    };

    let mut summary = RunSummary::default();
    for report in &reports {
        summary.record(report);
    }
    Ok((reports, summary))
}

/// Processes a single file. All I/O problems are captured in the report.
pub fn process_file(path: &Path, options: &Options, patterns: &Patterns) -> FileReport {
    let display_path = path.display().to_string();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            let mut report =
                FileReport::new(display_path, FormatKind::Unknown, Action::Failed);
            report.error = Some(format!("failed to read file: {}", e));
            return report;
        }
    };

    let kind = detect_format(&content, patterns);
    debug!(path = %path.display(), format = %kind, "detected format");

    match kind {
        FormatKind::Unknown => {
            FileReport::new(display_path, kind, Action::SkippedUnknown)
        }
        FormatKind::Converted => converted_file_report(display_path, &content, options, patterns),
        FormatKind::Gpt | FormatKind::Gemini => {
            legacy_file_report(path, display_path, &content, kind, options, patterns)
        }
    }
}

/// Already-converted files are skipped unless check mode or force asks for
/// an integrity re-validation. Rewriting would be a byte-identical no-op,
/// so nothing is ever written here.
fn converted_file_report(
    display_path: String,
    content: &str,
    options: &Options,
    patterns: &Patterns,
) -> FileReport {
    if !options.check && !options.force {
        return FileReport::new(display_path, FormatKind::Converted, Action::AlreadyConverted);
    }

    let (inline_set, ref_set) = footnote_sets(content, patterns);
    let integrity = integrity::check(&inline_set, &ref_set);
    let (inline_count, ref_count) = footnote_counts(content, patterns);

    let mut report = FileReport::new(display_path, FormatKind::Converted, Action::Checked);
    report.inline_citations = inline_count;
    report.unique_citations = inline_set.len();
    report.references = ref_count;
    report.missing_refs = integrity.missing.into_iter().collect();
    report.orphan_refs = integrity.orphans.into_iter().collect();
    report
}

fn legacy_file_report(
    path: &Path,
    display_path: String,
    content: &str,
    kind: FormatKind,
    options: &Options,
    patterns: &Patterns,
) -> FileReport {
    let conversion = convert(content, kind, patterns);

    let mut report = FileReport::new(display_path, kind, Action::Checked);
    report.inline_citations = conversion.inline_count;
    report.unique_citations = conversion.unique_count;
    report.references = conversion.ref_count;
    report.missing_refs = conversion.missing.iter().copied().collect();
    report.orphan_refs = conversion.orphans.iter().copied().collect();
    report.parse_failures = conversion.parse_failures;

    if options.check {
        return report;
    }

    if conversion.output == content {
        report.action = Action::Unchanged;
        return report;
    }

    if options.dry_run {
        log_preview(content, &conversion.output);
        report.action = Action::Preview;
        return report;
    }

    if let Err(e) = write_with_backup(path, &conversion.output) {
        report.action = Action::Failed;
        report.error = Some(e.to_string());
        return report;
    }

    report.action = Action::Converted;
    report
}

#[derive(Error, Debug)]
enum WriteError {
    #[error("failed to create backup '{path}': {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Backs up the original as `<name>.bak`, then writes the new content to a
/// sibling temp file and renames it over the original so a crash mid-write
/// never leaves a truncated document.
fn write_with_backup(path: &Path, content: &str) -> Result<(), WriteError> {
    let backup = sibling_with_suffix(path, ".bak");
    fs::copy(path, &backup).map_err(|e| WriteError::Backup {
        path: backup.clone(),
        source: e,
    })?;

    let tmp = sibling_with_suffix(path, ".tmp");
    fs::write(&tmp, content)
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|e| {
            let _ = fs::remove_file(&tmp);
            WriteError::Write {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

    debug!(path = %path.display(), backup = %backup.display(), "wrote converted file");
    Ok(())
}

/// `report.md` -> `report.md.bak` (suffix appended, extension kept).
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", name, suffix))
}

/// Logs the first differing lines of a dry run at info level; the CLI
/// raises its default log level in dry-run mode so the preview shows
/// without `--verbose`.
fn log_preview(old: &str, new: &str) {
    for (i, (old_line, new_line)) in preview_changes(old, new) {
        info!(line = i, old = old_line, new = new_line, "preview change");
    }
}

/// The first differing line pairs of a dry run, as (1-based line number,
/// (old line, new line)), capped at 20 changes.
fn preview_changes<'a>(old: &'a str, new: &'a str) -> Vec<(usize, (&'a str, &'a str))> {
    old.lines()
        .zip(new.lines())
        .enumerate()
        .filter(|(_, (old_line, new_line))| old_line != new_line)
        .map(|(i, pair)| (i + 1, pair))
        .take(20)
        .collect()
}

/// Markdown files of a directory, lexicographic by path. Backup and temp
/// siblings are excluded by the extension filter.
fn collect_markdown_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();

    if recursive {
        for entry in WalkDir::new(dir) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == "md") {
                        files.push(path.to_path_buf());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
            }
        }
    } else {
        let entries = fs::read_dir(dir).map_err(|e| BatchError::ListDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                        files.push(path);
                    }
                }
                Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
            }
        }
    }

    files.sort();
    Ok(files)
}
