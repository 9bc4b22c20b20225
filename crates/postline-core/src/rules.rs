//! Quality rule catalog.
//!
//! Static definitions consumed by the validators and the auto-corrector:
//!
//! - **Artifact rules** ([`ArtifactRule`]) — fixable formatting leftovers such
//!   as day headers, separator lines, stray list markers, HTML entities,
//!   zero-width characters, and runs of blank lines. Each rule carries its
//!   severity, score penalties, a [`Matcher`] for detection, and a [`Fix`]
//!   describing its rewrite.
//! - **Garbage rules** ([`GarbageRule`]) — whole-chunk patterns (separators,
//!   markers, digits, or punctuation only) that force rejection.
//! - **Content minimums** — length, letter, and word thresholds.
//!
//! Adding a new artifact type means adding one entry to [`ARTIFACT_RULES`];
//! validator control flow does not change.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::Severity;

/// Minimum trimmed length in characters.
pub const MIN_CONTENT_LENGTH: usize = 20;
/// Minimum number of alphabetic characters.
pub const MIN_LETTER_COUNT: usize = 10;
/// Minimum number of words.
pub const MIN_WORD_COUNT: usize = 3;

pub const TOO_SHORT_PENALTY: u32 = 50;
pub const TOO_FEW_LETTERS_PENALTY: u32 = 40;
pub const TOO_FEW_WORDS_PENALTY: u32 = 30;

pub const CODE_EMPTY: &str = "EMPTY";
pub const CODE_GARBAGE: &str = "GARBAGE_CONTENT";
pub const CODE_TOO_SHORT: &str = "TOO_SHORT";
pub const CODE_TOO_FEW_LETTERS: &str = "TOO_FEW_LETTERS";
pub const CODE_TOO_FEW_WORDS: &str = "TOO_FEW_WORDS";

// Line patterns are matched against a single trimmed line.
static RE_DAY_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^day[ \t]*\d+[ \t]*[:.\-–—]?$").unwrap());
static RE_MARKDOWN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}[ \t]+\S").unwrap());
static RE_SEP_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{3,}$").unwrap());
static RE_SEP_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-{3,}$").unwrap());
static RE_SEP_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^_{3,}$").unwrap());
static RE_SEP_EQUALS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^={3,}$").unwrap());
static RE_SEP_ASTERISK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\*{3,}$").unwrap());
static RE_SEP_EM_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[—–]+$").unwrap());
static RE_STRAY_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[•·▪◦‣*\-]$").unwrap());
static RE_ORPHAN_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]$").unwrap());

// Text patterns are matched against the whole content.
static RE_HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:nbsp|amp|lt|gt|quot|#39|apos|mdash|ndash|hellip|laquo|raquo);").unwrap()
});
static RE_ZERO_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{200B}\x{200C}\x{200D}\x{2060}\x{FEFF}]").unwrap());
static RE_BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

static RE_GARBAGE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s#=_*~\-—–]+$").unwrap());
static RE_GARBAGE_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\s|[•·▪◦‣*\-]|\d+[.)])+$").unwrap());
static RE_GARBAGE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d\s]+$").unwrap());
static RE_GARBAGE_NO_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\p{L}]+$").unwrap());

/// How an artifact rule detects its pattern.
pub enum Matcher {
    /// Matches if any trimmed line of the content matches.
    Line(&'static LazyLock<Regex>),
    /// Matches anywhere in the content.
    Text(&'static LazyLock<Regex>),
}

impl Matcher {
    /// Byte offset of the first match, if any.
    pub fn find(&self, text: &str) -> Option<usize> {
        match self {
            Matcher::Line(re) => {
                let mut offset = 0;
                for line in text.split('\n') {
                    if re.is_match(line.trim()) {
                        return Some(offset);
                    }
                    offset += line.len() + 1;
                }
                None
            }
            Matcher::Text(re) => re.find(text).map(|m| m.start()),
        }
    }
}

/// The deterministic rewrite attached to an artifact rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    /// Drop every line the rule's line matcher accepts.
    DeleteLines,
    /// Remove leading `#` heading markers but keep the heading text.
    StripHeadingMarker,
    /// Translate the fixed entity set to literal characters.
    DecodeEntities,
    /// Remove zero-width characters.
    StripZeroWidth,
    /// Collapse runs of three or more newlines to exactly two.
    CollapseBlankLines,
}

/// A fixable formatting artifact.
pub struct ArtifactRule {
    pub code: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    /// Correction note recorded when the fix changes the text.
    pub note: &'static str,
    pub pre_penalty: u32,
    /// `None` when the rule is not re-checked after formatting.
    pub post_penalty: Option<u32>,
    pub matcher: Matcher,
    pub fix: Fix,
}

impl ArtifactRule {
    pub fn find(&self, text: &str) -> Option<usize> {
        self.matcher.find(text)
    }

    /// Apply this rule's rewrite to `text`.
    pub fn apply(&self, text: &str) -> String {
        match (self.fix, &self.matcher) {
            (Fix::DeleteLines, Matcher::Line(re)) => text
                .split('\n')
                .filter(|line| !re.is_match(line.trim()))
                .collect::<Vec<_>>()
                .join("\n"),
            (Fix::StripHeadingMarker, Matcher::Line(re)) => text
                .split('\n')
                .map(|line| {
                    let trimmed = line.trim();
                    if re.is_match(trimmed) {
                        trimmed.trim_start_matches('#').trim_start().to_string()
                    } else {
                        line.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            (Fix::DecodeEntities, _) => decode_entities(text),
            (Fix::StripZeroWidth, _) => RE_ZERO_WIDTH.replace_all(text, "").into_owned(),
            (Fix::CollapseBlankLines, _) => collapse_blank_lines(text),
            // Line fixes paired with a text matcher have nothing to key on.
            (Fix::DeleteLines | Fix::StripHeadingMarker, Matcher::Text(_)) => text.to_string(),
        }
    }
}

macro_rules! separator_rule {
    ($code:literal, $what:literal, $re:expr) => {
        ArtifactRule {
            code: $code,
            severity: Severity::Warning,
            description: concat!("Separator line of ", $what),
            note: concat!("Removed ", $what, " separator lines"),
            pre_penalty: 5,
            post_penalty: Some(10),
            matcher: Matcher::Line($re),
            fix: Fix::DeleteLines,
        }
    };
}

/// Every fixable artifact rule, in detection order.
pub static ARTIFACT_RULES: [ArtifactRule; 13] = [
    ArtifactRule {
        code: "DAY_HEADER",
        severity: Severity::Warning,
        description: "Day header line present",
        note: "Removed Day header",
        pre_penalty: 5,
        post_penalty: Some(10),
        matcher: Matcher::Line(&RE_DAY_HEADER),
        fix: Fix::DeleteLines,
    },
    ArtifactRule {
        code: "MARKDOWN_HEADER",
        severity: Severity::Info,
        description: "Markdown heading markers present",
        note: "Removed markdown heading markers",
        pre_penalty: 3,
        post_penalty: Some(5),
        matcher: Matcher::Line(&RE_MARKDOWN_HEADER),
        fix: Fix::StripHeadingMarker,
    },
    separator_rule!("SEPARATOR_HASH", "###", &RE_SEP_HASH),
    separator_rule!("SEPARATOR_DASH", "---", &RE_SEP_DASH),
    separator_rule!("SEPARATOR_UNDERSCORE", "___", &RE_SEP_UNDERSCORE),
    separator_rule!("SEPARATOR_EQUALS", "===", &RE_SEP_EQUALS),
    separator_rule!("SEPARATOR_ASTERISK", "***", &RE_SEP_ASTERISK),
    separator_rule!("SEPARATOR_EM_DASH", "em-dash", &RE_SEP_EM_DASH),
    ArtifactRule {
        code: "STRAY_BULLET",
        severity: Severity::Warning,
        description: "Empty bullet marker line",
        note: "Removed empty bullet markers",
        pre_penalty: 3,
        post_penalty: Some(5),
        matcher: Matcher::Line(&RE_STRAY_BULLET),
        fix: Fix::DeleteLines,
    },
    ArtifactRule {
        code: "ORPHAN_NUMBER",
        severity: Severity::Warning,
        description: "Numbered marker without content",
        note: "Removed orphaned numbered markers",
        pre_penalty: 3,
        post_penalty: Some(5),
        matcher: Matcher::Line(&RE_ORPHAN_NUMBER),
        fix: Fix::DeleteLines,
    },
    ArtifactRule {
        code: "HTML_ENTITY",
        severity: Severity::Info,
        description: "HTML entities present",
        note: "Converted HTML entities to characters",
        pre_penalty: 2,
        post_penalty: None,
        matcher: Matcher::Text(&RE_HTML_ENTITY),
        fix: Fix::DecodeEntities,
    },
    ArtifactRule {
        code: "ZERO_WIDTH",
        severity: Severity::Info,
        description: "Zero-width characters present",
        note: "Removed zero-width characters",
        pre_penalty: 2,
        post_penalty: None,
        matcher: Matcher::Text(&RE_ZERO_WIDTH),
        fix: Fix::StripZeroWidth,
    },
    ArtifactRule {
        code: "EXCESS_BLANK_LINES",
        severity: Severity::Info,
        description: "Three or more consecutive line breaks",
        note: "Collapsed excessive blank lines",
        pre_penalty: 2,
        post_penalty: Some(5),
        matcher: Matcher::Text(&RE_BLANK_RUN),
        fix: Fix::CollapseBlankLines,
    },
];

/// Look up a fixable rule by issue code.
pub fn rule_for_code(code: &str) -> Option<&'static ArtifactRule> {
    ARTIFACT_RULES.iter().find(|r| r.code == code)
}

/// A whole-chunk pattern that marks content as not worth correcting.
pub struct GarbageRule {
    /// What the content consists of, e.g. `"digits"`.
    pub label: &'static str,
    pub pattern: &'static LazyLock<Regex>,
}

pub static GARBAGE_RULES: [GarbageRule; 4] = [
    GarbageRule {
        label: "separator characters",
        pattern: &RE_GARBAGE_SEPARATORS,
    },
    GarbageRule {
        label: "list markers",
        pattern: &RE_GARBAGE_MARKERS,
    },
    GarbageRule {
        label: "digits",
        pattern: &RE_GARBAGE_DIGITS,
    },
    GarbageRule {
        label: "punctuation and symbols",
        pattern: &RE_GARBAGE_NO_LETTERS,
    },
];

/// First garbage rule matching the trimmed content.
pub fn match_garbage(content: &str) -> Option<&'static GarbageRule> {
    let trimmed = content.trim();
    GARBAGE_RULES.iter().find(|g| g.pattern.is_match(trimmed))
}

/// Number of alphabetic characters (any script).
pub fn count_letters(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

/// Number of whitespace-separated tokens containing at least one letter or digit.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

fn decode_entities(text: &str) -> String {
    RE_HTML_ENTITY
        .replace_all(text, |caps: &Captures| {
            match &caps[0] {
                "&nbsp;" => " ",
                "&amp;" => "&",
                "&lt;" => "<",
                "&gt;" => ">",
                "&quot;" => "\"",
                "&#39;" | "&apos;" => "'",
                "&mdash;" => "—",
                "&ndash;" => "–",
                "&hellip;" => "…",
                "&laquo;" => "«",
                "&raquo;" => "»",
                other => other,
            }
            .to_string()
        })
        .into_owned()
}

/// Collapse any run of three or more newlines (blank lines may hold spaces) to two.
pub fn collapse_blank_lines(text: &str) -> String {
    RE_BLANK_RUN.replace_all(text, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_letters_counts_any_script() {
        assert_eq!(count_letters("abc 123 !!"), 3);
        assert_eq!(count_letters("Привет, мир"), 9);
        assert_eq!(count_letters("---"), 0);
    }

    #[test]
    fn test_count_words_ignores_marker_tokens() {
        assert_eq!(count_words("Hello world, this is a post."), 6);
        assert_eq!(count_words("- • — hello"), 1);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<&str> = ARTIFACT_RULES.iter().map(|r| r.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), ARTIFACT_RULES.len());
    }

    #[test]
    fn test_day_header_matches_whole_line_only() {
        let rule = rule_for_code("DAY_HEADER").unwrap();
        assert_eq!(rule.find("Day 1:\nHello"), Some(0));
        assert_eq!(rule.find("intro\n  day 12 \nbody"), Some(6));
        assert_eq!(rule.find("Stay consistent every single day!"), None);
        assert_eq!(rule.find("Day 1: Mondays are for planning"), None);
    }

    #[test]
    fn test_separator_rules_delete_only_separator_lines() {
        let rule = rule_for_code("SEPARATOR_UNDERSCORE").unwrap();
        assert_eq!(
            rule.apply("before\n___\nafter snake_case_name"),
            "before\nafter snake_case_name"
        );
    }

    #[test]
    fn test_heading_marker_keeps_text() {
        let rule = rule_for_code("MARKDOWN_HEADER").unwrap();
        assert_eq!(rule.apply("## Big news\nbody"), "Big news\nbody");
        assert_eq!(rule.find("#hashtag at start"), None);
    }

    #[test]
    fn test_entities_decode_once() {
        assert_eq!(
            decode_entities("tip&nbsp;for &lt;you&gt; &amp;nbsp;"),
            "tip for <you> &nbsp;"
        );
        assert_eq!(decode_entities("&hellip;&mdash;&#39;"), "…—'");
    }

    #[test]
    fn test_zero_width_stripped() {
        let rule = rule_for_code("ZERO_WIDTH").unwrap();
        assert!(rule.find("a\u{200B}b").is_some());
        assert_eq!(rule.apply("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn test_collapse_blank_lines_handles_whitespace_only_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n  \n\t\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_garbage_patterns() {
        assert_eq!(match_garbage("---").unwrap().label, "separator characters");
        assert_eq!(match_garbage("- \n- \n-").unwrap().label, "separator characters");
        assert_eq!(match_garbage("• \n1.\n2)").unwrap().label, "list markers");
        assert_eq!(match_garbage("123").unwrap().label, "digits");
        assert_eq!(match_garbage("?!?! ...").unwrap().label, "punctuation and symbols");
        assert!(match_garbage("Hello there").is_none());
    }
}
