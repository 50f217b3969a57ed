//! Citation extraction.
//!
//! Given a classified document, extracts the ordered inline citation
//! occurrences and the reference-list entries (number, title, URL), along
//! with the byte spans of the reference lines that were consumed. Spans are
//! what the rewriter later replaces, so extraction never mutates text.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::detect::{valid_gemini_neighborhood, FormatKind, Patterns};

/// A single inline citation occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineCitation {
    /// The citation number.
    pub number: u32,
    /// Start and end byte positions of the text to replace.
    pub span: (usize, usize),
    /// The raw matched text.
    pub raw: String,
}

/// A reference-list entry mapping a citation number to title and URL.
///
/// Either field may be empty when the source line did not carry it; the
/// rewriter still emits the definition line so numbering stays intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub number: u32,
    pub title: String,
    pub url: String,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Inline occurrences in original document order.
    pub inline: Vec<InlineCitation>,
    /// Reference entries, deduplicated by number (last definition wins),
    /// in ascending numeric order.
    pub refs: Vec<ReferenceEntry>,
    /// Byte spans of consumed reference lines, including the trailing
    /// newline where present.
    pub ref_line_spans: Vec<(usize, usize)>,
    /// Reference-shaped lines that could not be parsed. Surfaced as a
    /// warning, never an error.
    pub parse_failures: usize,
}

impl Extraction {
    /// Distinct citation numbers used inline.
    pub fn inline_numbers(&self) -> BTreeSet<u32> {
        self.inline.iter().map(|c| c.number).collect()
    }

    /// Distinct citation numbers defined in the reference list.
    pub fn ref_numbers(&self) -> BTreeSet<u32> {
        self.refs.iter().map(|r| r.number).collect()
    }
}

/// Extracts inline citations and reference entries from a legacy-format
/// document.
///
/// For `Unknown` and `Converted` kinds there is nothing to extract and an
/// empty result is returned.
pub fn extract(content: &str, kind: FormatKind, patterns: &Patterns) -> Extraction {
    match kind {
        FormatKind::Gpt => extract_gpt(content, patterns),
        FormatKind::Gemini => extract_gemini(content, patterns),
        FormatKind::Unknown | FormatKind::Converted => Extraction::default(),
    }
}

/// Distinct inline and definition numbers of an already-converted document.
///
/// Inline markers that are actually definition heads (`[^n]:` at line
/// start) are not counted as inline usage.
pub fn footnote_sets(content: &str, patterns: &Patterns) -> (BTreeSet<u32>, BTreeSet<u32>) {
    let refs: BTreeSet<u32> = patterns
        .footnote_ref
        .captures_iter(content)
        .filter_map(|cap| cap[1].parse().ok())
        .collect();

    let inline: BTreeSet<u32> = patterns
        .footnote_inline
        .captures_iter(content)
        .filter(|cap| {
            let m = cap.get(0).unwrap();
            let at_line_start = m.start() == 0 || content[..m.start()].ends_with('\n');
            let is_definition = at_line_start && content[m.end()..].starts_with(':');
            !is_definition
        })
        .filter_map(|cap| cap[1].parse().ok())
        .collect();

    (inline, refs)
}

/// Counts footnote markers and definitions in a converted document.
/// Returns (inline occurrences, definitions), occurrences not deduplicated.
pub fn footnote_counts(content: &str, patterns: &Patterns) -> (usize, usize) {
    let ref_count = patterns.footnote_ref.find_iter(content).count();
    let inline_count = patterns
        .footnote_inline
        .find_iter(content)
        .filter(|m| {
            let at_line_start = m.start() == 0 || content[..m.start()].ends_with('\n');
            !(at_line_start && content[m.end()..].starts_with(':'))
        })
        .count();
    (inline_count, ref_count)
}

// ---------------------------------------------------------------------------
// GPT format
// ---------------------------------------------------------------------------

fn extract_gpt(content: &str, patterns: &Patterns) -> Extraction {
    let mut by_number: BTreeMap<u32, ReferenceEntry> = BTreeMap::new();
    let mut ref_line_spans: Vec<(usize, usize)> = Vec::new();
    let mut parse_failures = 0usize;

    if let Some(section_start) = gpt_reference_section_start(content) {
        parse_gpt_references(
            content,
            section_start,
            patterns,
            &mut by_number,
            &mut ref_line_spans,
            &mut parse_failures,
        );
    }

    // Inline markers anywhere outside the consumed reference lines.
    let inline: Vec<InlineCitation> = patterns
        .gpt_inline
        .captures_iter(content)
        .filter_map(|cap| {
            let m = cap.get(0).unwrap();
            if overlaps_any(m.start(), m.end(), &ref_line_spans) {
                return None;
            }
            let number: u32 = cap[1].parse().ok()?;
            Some(InlineCitation {
                number,
                span: (m.start(), m.end()),
                raw: m.as_str().to_string(),
            })
        })
        .collect();

    Extraction {
        inline,
        refs: by_number.into_values().collect(),
        ref_line_spans,
        parse_failures,
    }
}

/// Locates the start of the GPT reference section: the line after the
/// references heading, or after the last `---` separator. `None` when the
/// document has no recognizable reference section.
///
/// When both exist, the earlier one wins: some GPT exports put the heading
/// first and close the section with a `---` followed by a raw URL list, so
/// a trailing separator must not hide the definitions above it.
fn gpt_reference_section_start(content: &str) -> Option<usize> {
    let mut after_separator = None;
    let mut after_heading = None;

    for (start, end) in line_spans(content) {
        let line = content[start..end].trim_end_matches('\n').trim();
        if line == "---" {
            after_separator = Some(end);
        } else if (line.starts_with("## References") || line.starts_with("## 参考文献"))
            && after_heading.is_none()
        {
            after_heading = Some(end);
        }
    }

    match (after_heading, after_separator) {
        (Some(heading), Some(separator)) => Some(heading.min(separator)),
        (heading, separator) => heading.or(separator),
    }
}

fn parse_gpt_references(
    content: &str,
    section_start: usize,
    patterns: &Patterns,
    by_number: &mut BTreeMap<u32, ReferenceEntry>,
    ref_line_spans: &mut Vec<(usize, usize)>,
    parse_failures: &mut usize,
) {
    let footnote_def_line = Regex::new(r"^\\?\[\^?(\d+)\\?\]?:\s*(.*)$").unwrap();
    let bare_url_line = Regex::new(r"^\[https?://[^\]]+\]\((https?://[^)]+)\)$").unwrap();
    let numbered_line = Regex::new(r"^(\d+)\.\s+(.*)$").unwrap();

    let lines: Vec<(usize, usize)> = line_spans(content)
        .into_iter()
        .filter(|(start, _)| *start >= section_start)
        .collect();

    let mut i = 0;
    while i < lines.len() {
        let (start, end) = lines[i];
        let line = content[start..end].trim_end_matches('\n').trim();
        i += 1;

        if line.is_empty() {
            continue;
        }

        // A separator after the entries closes the section; it and the raw
        // `[URL](URL)` list that follows duplicate the URLs already captured
        // above, so both are consumed and dropped.
        if line == "---" {
            if !by_number.is_empty() {
                ref_line_spans.push((start, end));
            }
            continue;
        }
        if bare_url_line.is_match(line) {
            ref_line_spans.push((start, end));
            continue;
        }

        // Already footnote-shaped but with embedded `[[m]](URL)` link junk:
        // `[^n]: Title [[12]](URL)[[7]](URL)`.
        if let Some(cap) = footnote_def_line.captures(line) {
            let Ok(number) = cap[1].parse::<u32>() else {
                *parse_failures += 1;
                continue;
            };
            let rest = &cap[2];
            let marker_urls: Vec<String> = patterns
                .gpt_inline
                .captures_iter(rest)
                .map(|c| c[2].to_string())
                .collect();
            let cleaned = patterns.gpt_inline.replace_all(rest, "");
            let (title, trailing_url) = split_title_and_url(&unescape_brackets(&cleaned));
            let url = marker_urls.into_iter().next().unwrap_or(trailing_url);
            by_number.insert(number, ReferenceEntry { number, title, url });
            ref_line_spans.push((start, end));
            continue;
        }

        // Variant reference line: `[[n]](URL) [[m]](URL) Title`, with the
        // real URL possibly on the following standalone `[URL](URL)` line.
        let markers: Vec<(u32, String)> = patterns
            .gpt_inline
            .captures_iter(line)
            .filter_map(|c| Some((c[1].parse().ok()?, c[2].to_string())))
            .collect();
        if !markers.is_empty() {
            let cleaned = patterns.gpt_inline.replace_all(line, "");
            let (title, _) = split_title_and_url(&unescape_brackets(&cleaned));
            ref_line_spans.push((start, end));

            let mut shared_url = None;
            if i < lines.len() {
                let (next_start, next_end) = lines[i];
                let next_line = content[next_start..next_end].trim_end_matches('\n').trim();
                if let Some(cap) = bare_url_line.captures(next_line) {
                    shared_url = Some(cap[1].to_string());
                    ref_line_spans.push((next_start, next_end));
                    i += 1;
                }
            }

            for (number, marker_url) in markers {
                let url = shared_url.clone().unwrap_or(marker_url);
                by_number.insert(
                    number,
                    ReferenceEntry {
                        number,
                        title: title.clone(),
                        url,
                    },
                );
            }
            continue;
        }

        // Plain numbered reference line: `N. Title URL`.
        if let Some(cap) = numbered_line.captures(line) {
            let Ok(number) = cap[1].parse::<u32>() else {
                *parse_failures += 1;
                continue;
            };
            let (title, url) = split_title_and_url(&cap[2]);
            by_number.insert(number, ReferenceEntry { number, title, url });
            ref_line_spans.push((start, end));
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini format
// ---------------------------------------------------------------------------

fn extract_gemini(content: &str, patterns: &Patterns) -> Extraction {
    let mut by_number: BTreeMap<u32, ReferenceEntry> = BTreeMap::new();
    let mut ref_line_spans: Vec<(usize, usize)> = Vec::new();
    let mut parse_failures = 0usize;

    // Reference lines: `N. Title, <artifact>..., [URL](URL)`. The Gemini
    // tool emits them at the end of the document without a reliable
    // delimiter, so they are recognized anywhere.
    for cap in patterns.gemini_ref.captures_iter(content) {
        let m = cap.get(0).unwrap();
        let Ok(number) = cap[1].parse::<u32>() else {
            parse_failures += 1;
            continue;
        };
        let title = cap[2]
            .trim()
            .trim_end_matches([',', '，', '、'])
            .trim()
            .to_string();
        let url = cap[3].to_string();
        by_number.insert(number, ReferenceEntry { number, title, url });

        let end = if content[m.end()..].starts_with('\n') {
            m.end() + 1
        } else {
            m.end()
        };
        ref_line_spans.push((m.start(), end));
    }

    // Reference-shaped lines that did not parse are warnings, not errors.
    for m in patterns.gemini_ref_candidate.find_iter(content) {
        if !overlaps_any(m.start(), m.end(), &ref_line_spans) {
            parse_failures += 1;
        }
    }

    // Inline markers: digits followed by a terminal rune, outside headings
    // and reference lines. An immediately preceding space is folded into
    // the span so the rewriter controls the spacing.
    let mut inline = Vec::new();
    for cap in patterns.gemini_inline.captures_iter(content) {
        let digits = cap.get(1).unwrap();
        if !valid_gemini_neighborhood(content, digits.start())
            || overlaps_any(digits.start(), digits.end(), &ref_line_spans)
        {
            continue;
        }
        let Ok(number) = cap[1].parse::<u32>() else {
            continue;
        };
        let start = if content[..digits.start()].ends_with(' ') {
            digits.start() - 1
        } else {
            digits.start()
        };
        inline.push(InlineCitation {
            number,
            span: (start, digits.end()),
            raw: content[start..digits.end()].to_string(),
        });
    }

    Extraction {
        inline,
        refs: by_number.into_values().collect(),
        ref_line_spans,
        parse_failures,
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Byte spans of every line, trailing newline included.
fn line_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' {
            spans.push((start, i + 1));
            start = i + 1;
        }
    }
    if start < content.len() {
        spans.push((start, content.len()));
    }
    spans
}

fn overlaps_any(start: usize, end: usize, spans: &[(usize, usize)]) -> bool {
    spans.iter().any(|(s, e)| start < *e && end > *s)
}

fn unescape_brackets(text: &str) -> String {
    text.replace(r"\[", "[").replace(r"\]", "]")
}

/// Splits reference-line text into title and trailing URL.
///
/// Accepts either a markdown link `[text](URL)` or a bare URL at the end of
/// the line; the URL is removed from the title and surrounding separators
/// are trimmed. Missing URLs yield an empty string.
fn split_title_and_url(text: &str) -> (String, String) {
    let trailing_md_link = Regex::new(r"\[[^\]]*\]\((https?://[^)]+)\)\s*$").unwrap();
    let trailing_bare_url = Regex::new(r"(https?://\S+)\s*$").unwrap();

    let text = text.trim();
    let (title, url) = if let Some(cap) = trailing_md_link.captures(text) {
        let m = cap.get(0).unwrap();
        (&text[..m.start()], cap[1].to_string())
    } else if let Some(cap) = trailing_bare_url.captures(text) {
        let m = cap.get(0).unwrap();
        (&text[..m.start()], cap[1].to_string())
    } else {
        (text, String::new())
    };

    let title = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches([',', '，', ';', '；', '-'])
        .trim()
        .to_string();
    (title, url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Patterns {
        Patterns::default()
    }

    #[test]
    fn test_extract_unknown_is_empty() {
        let result = extract("some text 42.", FormatKind::Unknown, &patterns());
        assert!(result.inline.is_empty());
        assert!(result.refs.is_empty());
    }

    // --- GPT inline ---

    #[test]
    fn test_gpt_inline_occurrences_in_order() {
        // Given: two GPT markers in prose
        let content = "See result[[1]](http://example.com/a) and also[[2]](http://example.com/b).";

        // When: we extract
        let result = extract(content, FormatKind::Gpt, &patterns());

        // Then: occurrences keep document order and spans cover the markers
        assert_eq!(result.inline.len(), 2);
        assert_eq!(result.inline[0].number, 1);
        assert_eq!(result.inline[1].number, 2);
        let (start, end) = result.inline[0].span;
        assert_eq!(&content[start..end], "[[1]](http://example.com/a)");
    }

    #[test]
    fn test_gpt_inline_repeated_number() {
        let content = "First[[3]](http://a) then again[[3]](http://a).";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.inline.len(), 2);
        assert_eq!(result.inline_numbers().len(), 1);
    }

    #[test]
    fn test_gpt_escaped_inline_marker() {
        let content = r"Claim[\[7\]](http://example.com/x) stands.";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.inline.len(), 1);
        assert_eq!(result.inline[0].number, 7);
    }

    // --- GPT references ---

    #[test]
    fn test_gpt_footnote_shaped_reference_line() {
        // Given: a reference section with marker junk inside a definition
        let content = "Body[[1]](http://a.com).\n\n## References\n\n[^1]: Some Title [[1]](http://a.com)\n";

        // When: we extract
        let result = extract(content, FormatKind::Gpt, &patterns());

        // Then: the entry is cleaned up
        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].number, 1);
        assert_eq!(result.refs[0].title, "Some Title");
        assert_eq!(result.refs[0].url, "http://a.com");
    }

    #[test]
    fn test_gpt_heading_refs_before_trailing_separator() {
        // Given: the export layout with the heading first, footnote-shaped
        // definitions, then a closing `---` and a raw URL list
        let content = "Body[[1]](http://a.com).\n\n## References\n\n[^1]: Alpha Title [[1]](http://a.com)\n\n---\n[http://a.com](http://a.com)\n";

        // When: we extract
        let result = extract(content, FormatKind::Gpt, &patterns());

        // Then: the definition above the separator is parsed, and the
        // separator plus the raw URL line are consumed
        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].number, 1);
        assert_eq!(result.refs[0].title, "Alpha Title");
        assert_eq!(result.refs[0].url, "http://a.com");
        assert_eq!(result.ref_line_spans.len(), 3);
        assert_eq!(result.inline.len(), 1);
    }

    #[test]
    fn test_gpt_variant_reference_with_url_line() {
        // Given: the variant layout where the URL sits on the next line
        let content = "Text[[2]](http://b.com/page).\n\n---\n[[2]](http://b.com/page) The B Paper\n[http://b.com/page](http://b.com/page)\n";

        // When: we extract
        let result = extract(content, FormatKind::Gpt, &patterns());

        // Then: the standalone URL line is consumed and attached
        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].title, "The B Paper");
        assert_eq!(result.refs[0].url, "http://b.com/page");
        assert_eq!(result.ref_line_spans.len(), 2);
    }

    #[test]
    fn test_gpt_variant_line_with_multiple_markers() {
        let content = "A[[1]](http://a) B[[2]](http://b).\n\n---\n[[1]](http://a) [[2]](http://b) Shared Title\n";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.refs.len(), 2);
        assert_eq!(result.refs[0].url, "http://a");
        assert_eq!(result.refs[1].url, "http://b");
        assert!(result.refs.iter().all(|r| r.title == "Shared Title"));
    }

    #[test]
    fn test_gpt_plain_numbered_reference() {
        let content = "Read this[[5]](http://e.org/v).\n\n---\n5. Fifth Source http://e.org/v\n";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].number, 5);
        assert_eq!(result.refs[0].title, "Fifth Source");
        assert_eq!(result.refs[0].url, "http://e.org/v");
    }

    #[test]
    fn test_gpt_reference_without_url_keeps_empty_field() {
        let content = "Cited[[4]](http://d.org).\n\n---\n4. Untraceable Memo\n";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].title, "Untraceable Memo");
        assert_eq!(result.refs[0].url, "");
    }

    #[test]
    fn test_gpt_inline_markers_in_reference_section_not_inline() {
        // Given: markers both in prose and in the reference section
        let content = "Claim[[1]](http://a).\n\n---\n[[1]](http://a) Title One\n";

        // When: we extract
        let result = extract(content, FormatKind::Gpt, &patterns());

        // Then: only the prose marker counts as inline usage
        assert_eq!(result.inline.len(), 1);
        assert!(result.inline[0].span.0 < content.find("---").unwrap());
    }

    #[test]
    fn test_gpt_no_reference_section() {
        let content = "Only inline[[9]](http://z.net) markers here.";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.inline.len(), 1);
        assert!(result.refs.is_empty());
    }

    #[test]
    fn test_gpt_duplicate_reference_last_wins() {
        let content = "X[[1]](http://a).\n\n---\n1. First Title http://a\n1. Second Title http://b\n";
        let result = extract(content, FormatKind::Gpt, &patterns());

        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].title, "Second Title");
        assert_eq!(result.refs[0].url, "http://b");
    }

    // --- Gemini ---

    #[test]
    fn test_gemini_inline_with_leading_space() {
        // Given: a Gemini marker with the usual leading space
        let content = "该方法有效 12。后续。";

        // When: we extract
        let result = extract(content, FormatKind::Gemini, &patterns());

        // Then: the span folds in the space and keeps the rune
        assert_eq!(result.inline.len(), 1);
        assert_eq!(result.inline[0].number, 12);
        let (start, end) = result.inline[0].span;
        assert_eq!(&content[start..end], " 12");
    }

    #[test]
    fn test_gemini_inline_skips_headings() {
        let content = "# 标题 3。\n\n正文 3。\n";
        let result = extract(content, FormatKind::Gemini, &patterns());

        assert_eq!(result.inline.len(), 1);
        assert!(result.inline[0].span.0 > content.find("正文").unwrap());
    }

    #[test]
    fn test_gemini_reference_line_with_artifact() {
        // Given: a reference line carrying the locale artifact
        let content = "正文 1。\n\n1. 研究报告, 访问时间为 2024年3月1日， [https://a.cn/r](https://a.cn/r)\n";

        // When: we extract
        let result = extract(content, FormatKind::Gemini, &patterns());

        // Then: the artifact is stripped from the title
        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].number, 1);
        assert_eq!(result.refs[0].title, "研究报告");
        assert_eq!(result.refs[0].url, "https://a.cn/r");
    }

    #[test]
    fn test_gemini_reference_line_without_artifact() {
        let content = "正文 2。\n\n2. Plain Report, https://b.cn/x\n";
        let result = extract(content, FormatKind::Gemini, &patterns());

        assert_eq!(result.refs.len(), 1);
        assert_eq!(result.refs[0].title, "Plain Report");
        assert_eq!(result.refs[0].url, "https://b.cn/x");
    }

    #[test]
    fn test_gemini_unparseable_reference_counts_failure() {
        // Given: a numbered line with the artifact but no URL
        let content = "正文 1。\n\n1. 标题, 访问时间为 2024年\n1. 好的, 访问时间为 2024年, [https://a.cn](https://a.cn)\n";

        // When: we extract
        let result = extract(content, FormatKind::Gemini, &patterns());

        // Then: the bad line is a warning, the good line still parses
        assert_eq!(result.parse_failures, 1);
        assert_eq!(result.refs.len(), 1);
    }

    #[test]
    fn test_gemini_inline_not_matched_inside_reference_line() {
        // Given: a reference line whose title contains `N，`
        let content = "正文 1。\n\n1. 报告 3，章节, 访问时间为 2024年, [https://a.cn](https://a.cn)\n";

        // When: we extract
        let result = extract(content, FormatKind::Gemini, &patterns());

        // Then: only the prose marker is inline
        assert_eq!(result.inline.len(), 1);
        assert_eq!(result.inline[0].number, 1);
    }

    // --- converted documents ---

    #[test]
    fn test_footnote_sets_separates_usage_from_definitions() {
        // Given: a converted doc with one used and one orphan definition
        let content = "Uses[^1] only.\n\n[^1]: One http://a\n[^3]: Three http://c\n";

        // When: we collect the sets
        let (inline, refs) = footnote_sets(content, &patterns());

        // Then: definitions do not count as inline usage
        assert_eq!(inline, BTreeSet::from([1]));
        assert_eq!(refs, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_footnote_counts() {
        let content = "A[^1] B[^2] A again[^1].\n\n[^1]: One http://a\n[^2]: Two http://b\n";
        let (inline, refs) = footnote_counts(content, &patterns());

        assert_eq!(inline, 3);
        assert_eq!(refs, 2);
    }

    // --- helpers ---

    #[test]
    fn test_split_title_and_url_markdown_link() {
        let (title, url) = split_title_and_url("A Study, [site](https://x.org/p)");
        assert_eq!(title, "A Study");
        assert_eq!(url, "https://x.org/p");
    }

    #[test]
    fn test_split_title_and_url_bare() {
        let (title, url) = split_title_and_url("A Study https://x.org/p");
        assert_eq!(title, "A Study");
        assert_eq!(url, "https://x.org/p");
    }

    #[test]
    fn test_split_title_and_url_missing_url() {
        let (title, url) = split_title_and_url("Just a title");
        assert_eq!(title, "Just a title");
        assert_eq!(url, "");
    }
}
