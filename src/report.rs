//! Per-file and per-run reporting.
//!
//! `FileReport` is the structured outcome of processing one file; it
//! renders as a one-line terminal report and serializes to JSON for the
//! `--json` output mode. `RunSummary` aggregates a batch.

use std::fmt;

use serde::Serialize;

use crate::detect::FormatKind;

/// What the driver did (or could not do) with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// File was rewritten in place.
    Converted,
    /// Dry run: conversion computed, nothing written.
    Preview,
    /// Check mode: format and integrity reported only.
    Checked,
    /// Already in footnote format; skipped without force.
    AlreadyConverted,
    /// Legacy format detected but conversion produced identical text.
    Unchanged,
    /// No recognized citation convention.
    SkippedUnknown,
    /// Hard error (unreadable or unwritable).
    Failed,
}

/// Outcome of processing a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub format: FormatKind,
    pub action: Action,
    /// Inline citation occurrences (not deduplicated).
    pub inline_citations: usize,
    /// Distinct inline citation numbers.
    pub unique_citations: usize,
    /// Reference definitions found or emitted.
    pub references: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_refs: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orphan_refs: Vec<u32>,
    #[serde(skip_serializing_if = "is_zero")]
    pub parse_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl FileReport {
    pub fn new(path: String, format: FormatKind, action: Action) -> Self {
        FileReport {
            path,
            format,
            action,
            inline_citations: 0,
            unique_citations: 0,
            references: 0,
            missing_refs: Vec::new(),
            orphan_refs: Vec::new(),
            parse_failures: 0,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.action == Action::Failed
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: format: {}", self.path, self.format)?;

        match self.action {
            Action::Converted => write!(
                f,
                " | converted | {} citations ({} unique), {} refs",
                self.inline_citations, self.unique_citations, self.references
            )?,
            Action::Preview => write!(
                f,
                " | preview, nothing written | {} citations ({} unique), {} refs",
                self.inline_citations, self.unique_citations, self.references
            )?,
            Action::Checked => {
                if self.format == FormatKind::Converted {
                    write!(
                        f,
                        " | no conversion needed | {} citations ({} unique), {} refs",
                        self.inline_citations, self.unique_citations, self.references
                    )?;
                } else {
                    write!(
                        f,
                        " | needs conversion | {} citations ({} unique), {} refs",
                        self.inline_citations, self.unique_citations, self.references
                    )?;
                }
            }
            Action::AlreadyConverted => {
                write!(f, " | already converted - use --force to re-check")?
            }
            Action::Unchanged => write!(f, " | no changes needed")?,
            Action::SkippedUnknown => write!(f, " | unknown format - skipping")?,
            Action::Failed => write!(
                f,
                " | error: {}",
                self.error.as_deref().unwrap_or("unknown error")
            )?,
        }

        if !self.missing_refs.is_empty() {
            write!(f, " | warning: missing refs {:?}", preview(&self.missing_refs))?;
        }
        if !self.orphan_refs.is_empty() {
            write!(f, " | warning: orphan refs {:?}", preview(&self.orphan_refs))?;
        }
        if self.parse_failures > 0 {
            write!(f, " | warning: {} unparsed reference line(s)", self.parse_failures)?;
        }
        Ok(())
    }
}

/// First few numbers of a warning set, so reports stay one line.
fn preview(numbers: &[u32]) -> &[u32] {
    &numbers[..numbers.len().min(5)]
}

/// Aggregated counts for a batch run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    /// Files converted, previewed, or checked.
    pub processed: usize,
    /// Files already in footnote format.
    pub already_converted: usize,
    /// Unknown-format and no-change files.
    pub skipped: usize,
    /// Files with hard errors.
    pub errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &FileReport) {
        match report.action {
            Action::Converted | Action::Preview | Action::Checked => self.processed += 1,
            Action::AlreadyConverted => self.already_converted += 1,
            Action::Unchanged | Action::SkippedUnknown => self.skipped += 1,
            Action::Failed => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.already_converted + self.skipped + self.errors
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: {} processed, {} already converted, {} skipped, {} errors",
            self.processed, self.already_converted, self.skipped, self.errors
        )
    }
}
