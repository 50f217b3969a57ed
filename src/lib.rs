//! footnote-tools: normalize research-report citations to Markdown footnotes.
//!
//! This library provides functionality to:
//! - Detect the citation convention of an AI-generated research report
//! - Extract inline citation occurrences and reference-list entries
//! - Rewrite documents to the canonical footnote format (`[^n]` inline,
//!   `[^n]: Title URL` definitions)
//! - Report integrity issues (missing and orphan references)
//! - Process single files or whole directories with backups

pub mod batch;
pub mod detect;
pub mod extract;
pub mod integrity;
pub mod report;
pub mod rewrite;

pub use batch::{process_file, run, BatchError, Options};
pub use detect::{detect_format, FormatKind, PatternError, Patterns};
pub use extract::{extract, footnote_sets, Extraction, InlineCitation, ReferenceEntry};
pub use integrity::{check, IntegrityReport};
pub use report::{Action, FileReport, RunSummary};
pub use rewrite::{convert, Conversion};
