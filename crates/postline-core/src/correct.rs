//! Auto-correction of fixable quality issues.
//!
//! [`auto_correct`] applies the rewrite of every flagged fixable rule, once
//! per category, and records a human-readable note only when the rewrite
//! actually changed the text. [`normalize_bullets`] and [`clean_whitespace`]
//! are unconditional layout helpers run by the pipeline after correction.
//! All three are no-ops on content without matching artifacts.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::QualityIssue;
use crate::rules::{self, collapse_blank_lines, ArtifactRule, ARTIFACT_RULES};

/// Canonical bullet glyph for list items.
pub const CANONICAL_BULLET: char = '•';

static RE_LINE_START_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)[-*][ \t]+").unwrap());

/// Corrected text plus one note per category that changed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub content: String,
    pub corrections: Vec<String>,
}

/// Upper bound on re-detection passes after the caller's issues are applied.
const MAX_PASSES: usize = 4;

/// Apply the rewrite for every fixable issue in `issues`.
///
/// Issues with unknown codes or `auto_fixable = false` are ignored. A fix can
/// expose another artifact (decoding `&amp;nbsp;`, stripping a `##` that hid a
/// day header), so the result is re-scanned against every artifact rule and
/// re-corrected until nothing changes, bounded by [`MAX_PASSES`]. Each note
/// appears once. The result is always trimmed with any residual run of 3+
/// newlines collapsed to 2.
pub fn auto_correct(content: &str, issues: &[QualityIssue]) -> Correction {
    let mut text = content.to_string();
    let mut corrections = Vec::new();
    let mut applied: Vec<&str> = Vec::new();

    for issue in issues.iter().filter(|i| i.auto_fixable) {
        if applied.contains(&issue.code.as_str()) {
            continue;
        }
        applied.push(issue.code.as_str());

        let Some(rule) = rules::rule_for_code(&issue.code) else {
            tracing::debug!(code = %issue.code, "no rewrite registered for issue code");
            continue;
        };
        apply_rule(rule, &mut text, &mut corrections);
    }
    text = collapse_blank_lines(text.trim());

    for _ in 0..MAX_PASSES {
        let before = text.clone();
        for rule in ARTIFACT_RULES.iter() {
            if rule.find(&text).is_some() {
                apply_rule(rule, &mut text, &mut corrections);
            }
        }
        text = collapse_blank_lines(text.trim());
        if text == before {
            break;
        }
    }

    Correction {
        content: text,
        corrections,
    }
}

fn apply_rule(rule: &ArtifactRule, text: &mut String, corrections: &mut Vec<String>) {
    let fixed = rule.apply(text);
    if fixed != *text {
        if !corrections.iter().any(|note| note == rule.note) {
            corrections.push(rule.note.to_string());
        }
        *text = fixed;
    }
}

/// Rewrite `- ` and `* ` list markers at line starts to the canonical bullet.
pub fn normalize_bullets(content: &str) -> String {
    let replacement = format!("${{1}}{} ", CANONICAL_BULLET);
    RE_LINE_START_BULLET
        .replace_all(content, replacement.as_str())
        .into_owned()
}

/// Strip leading and trailing whitespace from every line.
pub fn clean_whitespace(content: &str) -> String {
    content
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::pre_validate;

    fn correct(content: &str) -> Correction {
        let issues = pre_validate(content).issues;
        auto_correct(content, &issues)
    }

    #[test]
    fn test_day_header_removed_with_note() {
        let out = correct("Day 1:\nHello world, this is a real post.");
        assert_eq!(out.content, "Hello world, this is a real post.");
        assert_eq!(out.corrections, vec!["Removed Day header"]);
    }

    #[test]
    fn test_one_note_per_category() {
        let out = correct("Intro line for the post\n---\nmiddle part here\n---\nthe end of it");
        assert_eq!(out.corrections, vec!["Removed --- separator lines"]);
        assert_eq!(
            out.content,
            "Intro line for the post\nmiddle part here\nthe end of it"
        );
    }

    #[test]
    fn test_entities_become_literal_characters() {
        let out = correct("Great tip&nbsp;for you: stay consistent every single day!");
        assert_eq!(
            out.content,
            "Great tip for you: stay consistent every single day!"
        );
        assert_eq!(out.corrections, vec!["Converted HTML entities to characters"]);
    }

    #[test]
    fn test_unchanged_text_records_no_note() {
        let issue = QualityIssue {
            code: "ZERO_WIDTH".to_string(),
            severity: crate::models::Severity::Info,
            description: String::new(),
            auto_fixable: true,
            position: None,
        };
        let out = auto_correct("nothing invisible here", &[issue]);
        assert!(out.corrections.is_empty());
        assert_eq!(out.content, "nothing invisible here");
    }

    #[test]
    fn test_non_fixable_issues_ignored() {
        let issues = pre_validate("Hi").issues;
        let out = auto_correct("  Hi  ", &issues);
        assert_eq!(out.content, "Hi");
        assert!(out.corrections.is_empty());
    }

    #[test]
    fn test_deleting_lines_never_leaves_blank_runs() {
        let out = correct("First paragraph of text\n\n•\n\n2.\n\nSecond paragraph of text");
        assert_eq!(out.content, "First paragraph of text\n\nSecond paragraph of text");
        assert_eq!(
            out.corrections,
            vec!["Removed empty bullet markers", "Removed orphaned numbered markers"]
        );
    }

    #[test]
    fn test_auto_correct_is_idempotent() {
        let inputs = [
            "Day 4.\n## Morning routine\n\n\n\nDrink water&hellip;\n___\n•\nthen stretch\u{200B}!",
            "### \n1.\nKeep going, you are doing great work.",
            "Plain post with nothing to fix at all.",
            "Tip &amp;nbsp; stay consistent every single day, it adds up.",
            "## Day 1\nHello world, this is a real post.",
            "\u{200B}## Weekly wins\nShipped the new onboarding flow today.",
        ];
        for input in inputs {
            let first = correct(input);
            let second = correct(&first.content);
            assert_eq!(second.content, first.content, "input {:?}", input);
            assert!(second.corrections.is_empty(), "input {:?}", input);
        }
    }

    #[test]
    fn test_fix_that_exposes_an_artifact_is_followed_through() {
        let out = correct("## Day 1\nHello world, this is a real post.");
        assert_eq!(out.content, "Hello world, this is a real post.");
        assert_eq!(
            out.corrections,
            vec!["Removed markdown heading markers", "Removed Day header"]
        );

        let out = correct("Tip &amp;nbsp; stay consistent every single day, it adds up.");
        assert_eq!(
            out.content,
            "Tip   stay consistent every single day, it adds up."
        );
        assert_eq!(out.corrections, vec!["Converted HTML entities to characters"]);
    }

    #[test]
    fn test_normalize_bullets_only_at_line_start() {
        assert_eq!(
            normalize_bullets("- one\n* two\n  - three\nnot - this\n**bold**"),
            "• one\n• two\n  • three\nnot - this\n**bold**"
        );
        let once = normalize_bullets("- a\n* b");
        assert_eq!(normalize_bullets(&once), once);
    }

    #[test]
    fn test_clean_whitespace_flushes_lines_left() {
        assert_eq!(
            clean_whitespace("  • item  \n\tprose line\t\n   \nlast"),
            "• item\nprose line\n\nlast"
        );
        let once = clean_whitespace(" a \n b ");
        assert_eq!(clean_whitespace(&once), once);
    }
}
