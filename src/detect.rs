//! Citation format detection.
//!
//! Classifies a report document by the citation convention it uses:
//! GPT-style `[[n]](URL)` markers, Gemini-style ` n。` markers with a
//! numbered reference list, the already-converted footnote format, or
//! unknown.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The citation convention detected in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// No recognized citation convention; the document is left untouched.
    Unknown,
    /// GPT report format: inline `[[n]](URL)` markers.
    Gpt,
    /// Gemini report format: inline ` n。` markers and a numbered
    /// reference list with access-time artifacts.
    Gemini,
    /// Already in footnote format: `[^n]` inline, `[^n]:` definitions.
    Converted,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::Unknown => "unknown",
            FormatKind::Gpt => "gpt",
            FormatKind::Gemini => "gemini",
            FormatKind::Converted => "converted",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur when building a pattern set.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid pattern configuration: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Gemini terminal punctuation must not be empty")]
    EmptyRunes,
}

/// Gemini inline markers end with one of these runes in the known tool output.
pub const DEFAULT_GEMINI_RUNES: &str = "。，";

/// Locale artifact the Gemini tool injects between title and URL in
/// reference lines ("accessed at ...").
pub const DEFAULT_LOCALE_ARTIFACT: &str = "访问时间为";

/// Compiled pattern set for detection and extraction.
///
/// The Gemini terminal punctuation and the locale-artifact marker are
/// tool-specific, so both are configurable; the defaults match the known
/// Gemini report output.
#[derive(Debug, Clone)]
pub struct Patterns {
    /// GPT inline marker: `[[n]](URL)`, with optionally escaped brackets.
    pub gpt_inline: Regex,
    /// Footnote inline marker: `[^n]`.
    pub footnote_inline: Regex,
    /// Footnote definition at line start: `[^n]:`.
    pub footnote_ref: Regex,
    /// Gemini inline marker: 1-3 digits followed by a terminal rune.
    /// Neighbor characters are validated separately (the regex crate has
    /// no look-around).
    pub gemini_inline: Regex,
    /// Gemini reference line: `N. Title, <artifact>..., [URL](URL)`.
    pub gemini_ref: Regex,
    /// Cheap signal for Gemini reference lines: numbered line carrying
    /// the locale artifact.
    pub gemini_ref_hint: Regex,
    /// Candidate reference line that should parse but may not: numbered
    /// line containing the artifact or a URL.
    pub gemini_ref_candidate: Regex,
}

impl Patterns {
    /// Builds a pattern set with custom Gemini terminal runes and
    /// locale-artifact marker.
    pub fn with_config(gemini_runes: &str, locale_artifact: &str) -> Result<Self, PatternError> {
        if gemini_runes.is_empty() {
            return Err(PatternError::EmptyRunes);
        }
        let runes = regex::escape(gemini_runes);
        let artifact = regex::escape(locale_artifact);

        Ok(Patterns {
            gpt_inline: Regex::new(r"\[\\?\[(\d+)\\?\]\]\(([^)]+)\)")?,
            footnote_inline: Regex::new(r"\[\^(\d+)\]")?,
            footnote_ref: Regex::new(r"(?m)^\[\^(\d+)\]:")?,
            gemini_inline: Regex::new(&format!(r"(\d{{1,3}})[{}]", runes))?,
            gemini_ref: Regex::new(&format!(
                r"(?m)^(\d+)\.\s+(.+?)(?:,\s*{}[^，,]*[，,])?\s*\[?(https?://[^\s\]\)]+)\]?(?:\([^)]*\))?\s*$",
                artifact
            ))?,
            gemini_ref_hint: Regex::new(&format!(r"(?m)^\d+\.\s.*{}", artifact))?,
            gemini_ref_candidate: Regex::new(&format!(
                r"(?m)^\d+\.\s.*(?:{}|https?://)",
                artifact
            ))?,
        })
    }
}

impl Default for Patterns {
    fn default() -> Self {
        // The default configuration is statically known to compile.
        Patterns::with_config(DEFAULT_GEMINI_RUNES, DEFAULT_LOCALE_ARTIFACT).unwrap()
    }
}

/// Detects the citation convention used by a document.
///
/// Detection precedence: already-converted, then GPT, then Gemini, then
/// unknown. A document only counts as converted when no legacy markers
/// remain, so partially converted files are still picked up.
///
/// # Examples
///
/// ```
/// use footnote_tools::{detect_format, FormatKind, Patterns};
///
/// let patterns = Patterns::default();
/// let kind = detect_format("See result[[1]](http://example.com/a).", &patterns);
/// assert_eq!(kind, FormatKind::Gpt);
/// ```
pub fn detect_format(content: &str, patterns: &Patterns) -> FormatKind {
    let has_gpt = patterns.gpt_inline.is_match(content);
    let has_footnotes =
        patterns.footnote_inline.is_match(content) && patterns.footnote_ref.is_match(content);
    let has_gemini = patterns.gemini_ref_hint.is_match(content)
        || (!patterns.footnote_inline.is_match(content)
            && gemini_inline_present(content, patterns));

    if has_footnotes && !has_gpt && !has_gemini {
        return FormatKind::Converted;
    }
    if has_gpt {
        return FormatKind::Gpt;
    }
    if has_gemini {
        return FormatKind::Gemini;
    }
    FormatKind::Unknown
}

/// True when at least one valid Gemini inline marker occurs outside
/// heading lines.
///
/// A numeral followed by a terminal rune only counts when the preceding
/// character is not a digit or an opening bracket, so plain list numbers
/// and footnote markers are not misread as citations.
fn gemini_inline_present(content: &str, patterns: &Patterns) -> bool {
    patterns
        .gemini_inline
        .find_iter(content)
        .any(|m| valid_gemini_neighborhood(content, m.start()))
}

/// Validates the context around a Gemini inline candidate at `start`.
pub(crate) fn valid_gemini_neighborhood(content: &str, start: usize) -> bool {
    let before = &content[..start];
    if let Some(prev) = before.chars().next_back() {
        if prev.is_ascii_digit() || prev == '[' || prev == '^' {
            return false;
        }
    }
    // Reject matches on heading lines so section numbers survive.
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    !content[line_start..].trim_start().starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_empty() {
        let patterns = Patterns::default();
        assert_eq!(detect_format("", &patterns), FormatKind::Unknown);
    }

    #[test]
    fn test_detect_plain_text() {
        let patterns = Patterns::default();
        let kind = detect_format("Just prose, nothing cited here.", &patterns);
        assert_eq!(kind, FormatKind::Unknown);
    }

    #[test]
    fn test_detect_gpt_inline() {
        // Given: a document with a GPT inline marker
        let content = "Result shown[[3]](https://example.com/paper) in the study.";
        let patterns = Patterns::default();

        // Then: it is classified as GPT
        assert_eq!(detect_format(content, &patterns), FormatKind::Gpt);
    }

    #[test]
    fn test_detect_gpt_escaped_brackets() {
        // Given: the escaped variant some exports produce
        let content = r"Result shown[\[3\]](https://example.com/paper) here.";
        let patterns = Patterns::default();

        assert_eq!(detect_format(content, &patterns), FormatKind::Gpt);
    }

    #[test]
    fn test_detect_gemini_by_reference_artifact() {
        // Given: a numbered reference line carrying the locale artifact
        let content = "正文内容 1。\n\n1. 标题, 访问时间为 2024年1月, [https://a.cn](https://a.cn)\n";
        let patterns = Patterns::default();

        assert_eq!(detect_format(content, &patterns), FormatKind::Gemini);
    }

    #[test]
    fn test_detect_gemini_by_inline_punctuation() {
        // Given: inline markers with the ideographic full stop, no refs yet
        let content = "该方法有效 12。后续段落继续。";
        let patterns = Patterns::default();

        assert_eq!(detect_format(content, &patterns), FormatKind::Gemini);
    }

    #[test]
    fn test_detect_converted() {
        // Given: a document already in footnote format
        let content = "Text with a footnote[^1].\n\n[^1]: Some Title https://example.com\n";
        let patterns = Patterns::default();

        assert_eq!(detect_format(content, &patterns), FormatKind::Converted);
    }

    #[test]
    fn test_detect_legacy_wins_over_converted() {
        // Given: a half-converted document where GPT markers remain
        let content = "Old marker[[2]](https://b.org) and new[^1].\n\n[^1]: A https://a.org\n";
        let patterns = Patterns::default();

        // Then: the legacy format wins so the file gets reprocessed
        assert_eq!(detect_format(content, &patterns), FormatKind::Gpt);
    }

    #[test]
    fn test_sentence_final_numeral_is_not_gemini() {
        // Given: an ordinary sentence ending in a number and ASCII period
        let content = "The answer is 42. Nothing else.";
        let patterns = Patterns::default();

        // Then: generic punctuation does not trigger Gemini detection
        assert_eq!(detect_format(content, &patterns), FormatKind::Unknown);
    }

    #[test]
    fn test_heading_numbers_do_not_trigger_gemini() {
        let content = "# 第 3 章。\n\n正文没有引用标记。\n";
        let patterns = Patterns::default();

        assert_eq!(detect_format(content, &patterns), FormatKind::Unknown);
    }

    #[test]
    fn test_footnote_marker_not_misread_as_gemini() {
        // Given: a converted doc where a footnote marker precedes a rune
        let content = "观点[^12]。\n\n[^12]: 标题 https://example.cn\n";
        let patterns = Patterns::default();

        assert_eq!(detect_format(content, &patterns), FormatKind::Converted);
    }

    #[test]
    fn test_custom_gemini_runes() {
        // Given: a pattern set configured for a different terminal rune
        let patterns = Patterns::with_config("；", DEFAULT_LOCALE_ARTIFACT).unwrap();
        let content = "该方法有效 7；后续内容。";

        // Then: the custom rune is detected, the default ones are not
        assert_eq!(detect_format(content, &patterns), FormatKind::Gemini);
        assert_eq!(
            detect_format(content, &Patterns::default()),
            FormatKind::Unknown
        );
    }

    #[test]
    fn test_empty_runes_rejected() {
        let result = Patterns::with_config("", DEFAULT_LOCALE_ARTIFACT);
        assert!(matches!(result, Err(PatternError::EmptyRunes)));
    }
}
