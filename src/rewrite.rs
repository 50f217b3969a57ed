//! Document rewriting.
//!
//! Replaces every inline citation occurrence with a footnote marker and the
//! legacy reference-list lines with one canonical block, producing the final
//! converted text plus the integrity report for the document.

use std::collections::BTreeSet;

use crate::detect::{FormatKind, Patterns};
use crate::extract::{extract, Extraction, ReferenceEntry};
use crate::integrity;

/// Result of converting one document.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The rewritten document text.
    pub output: String,
    /// Number of inline occurrences rewritten.
    pub inline_count: usize,
    /// Number of distinct inline citation numbers.
    pub unique_count: usize,
    /// Number of reference definitions emitted.
    pub ref_count: usize,
    /// Citation numbers used inline with no reference definition.
    pub missing: BTreeSet<u32>,
    /// Reference numbers never used inline.
    pub orphans: BTreeSet<u32>,
    /// Reference-shaped lines that could not be parsed.
    pub parse_failures: usize,
}

/// Converts a legacy-format document to the footnote convention.
///
/// Citation numbers are never renumbered, so the output stays traceable to
/// the original reference list even when numbers are non-contiguous. Missing
/// references get no definition line; orphan references keep theirs. Both
/// are reported in the result.
///
/// # Examples
///
/// ```
/// use footnote_tools::{convert, FormatKind, Patterns};
///
/// let input = "See result[[1]](http://example.com/a).\n\n---\n1. A Paper http://example.com/a\n";
/// let conversion = convert(input, FormatKind::Gpt, &Patterns::default());
/// assert!(conversion.output.contains("See result[^1]."));
/// assert!(conversion.output.contains("[^1]: A Paper http://example.com/a"));
/// ```
pub fn convert(content: &str, kind: FormatKind, patterns: &Patterns) -> Conversion {
    let extraction = extract(content, kind, patterns);
    let report = integrity::check(&extraction.inline_numbers(), &extraction.ref_numbers());

    let output = rewrite(content, kind, &extraction);

    Conversion {
        output,
        inline_count: extraction.inline.len(),
        unique_count: extraction.inline_numbers().len(),
        ref_count: extraction.refs.len(),
        missing: report.missing,
        orphans: report.orphans,
        parse_failures: extraction.parse_failures,
    }
}

/// Applies all span edits to the document text.
///
/// Replacements run from the end of the text towards the beginning so that
/// earlier spans stay valid while later ones are rewritten.
fn rewrite(content: &str, kind: FormatKind, extraction: &Extraction) -> String {
    // (span, replacement) edits; extraction guarantees inline spans never
    // overlap consumed reference lines.
    let mut edits: Vec<((usize, usize), String)> = Vec::new();

    for citation in &extraction.inline {
        let marker = match kind {
            // Gemini spans fold in the preceding space; re-emit it so the
            // marker stays separated from the word before it.
            FormatKind::Gemini => format!(" [^{}]", citation.number),
            _ => format!("[^{}]", citation.number),
        };
        edits.push((citation.span, marker));
    }

    if !extraction.ref_line_spans.is_empty() {
        let mut spans = extraction.ref_line_spans.clone();
        spans.sort_unstable();

        if extraction.refs.is_empty() {
            // Consumed lines with no parsed entries (a stray raw URL list)
            // are simply removed.
            for span in &spans {
                edits.push((*span, String::new()));
            }
        } else {
            // The first consumed line becomes the canonical block; the rest
            // are deleted.
            let first = spans[0];
            let mut block = reference_block(&extraction.refs);
            if content[first.0..first.1].ends_with('\n') {
                block.push('\n');
            }
            edits.push((first, block));
            for span in &spans[1..] {
                edits.push((*span, String::new()));
            }
        }
    }

    edits.sort_by(|a, b| b.0 .0.cmp(&a.0 .0));

    let mut result = content.to_string();
    for ((start, end), replacement) in edits {
        result.replace_range(start..end, &replacement);
    }
    result
}

/// Renders the canonical reference block: one `[^n]: Title URL` line per
/// distinct number in ascending numeric order. Entries with a missing title
/// or URL keep their line with the field left empty.
fn reference_block(refs: &[ReferenceEntry]) -> String {
    let mut entries: Vec<&ReferenceEntry> = refs.iter().collect();
    entries.sort_by_key(|r| r.number);

    let lines: Vec<String> = entries
        .iter()
        .map(|r| {
            let mut line = format!("[^{}]:", r.number);
            if !r.title.is_empty() {
                line.push(' ');
                line.push_str(&r.title);
            }
            if !r.url.is_empty() {
                line.push(' ');
                line.push_str(&r.url);
            }
            line
        })
        .collect();

    lines.join("\n")
}
