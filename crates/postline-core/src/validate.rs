//! Pre- and post-validation against the rule catalog.
//!
//! [`pre_validate`] scans a raw chunk before any correction; [`post_validate`]
//! is the final gate on formatted text. Both start at a score of 100 and
//! subtract per-issue penalties from [`crate::rules`]. Empty and garbage
//! content short-circuits with a fatal issue, and any fatal issue pins the
//! score to 0.

use crate::models::{QualityIssue, QualityResult, Severity};
use crate::rules::{
    self, ArtifactRule, ARTIFACT_RULES, CODE_EMPTY, CODE_GARBAGE, CODE_TOO_FEW_LETTERS,
    CODE_TOO_FEW_WORDS, CODE_TOO_SHORT, MIN_CONTENT_LENGTH, MIN_LETTER_COUNT, MIN_WORD_COUNT,
    TOO_FEW_LETTERS_PENALTY, TOO_FEW_WORDS_PENALTY, TOO_SHORT_PENALTY,
};

/// Validate a raw chunk before correction.
///
/// `is_valid` is true iff no issue is both `error` severity and non-fixable.
pub fn pre_validate(content: &str) -> QualityResult {
    if let Some(fatal) = fatal_content_issue(content) {
        return rejected(fatal);
    }

    let mut score: i64 = 100;
    let mut issues = Vec::new();

    for rule in ARTIFACT_RULES.iter() {
        if let Some(position) = rule.find(content) {
            issues.push(artifact_issue(rule, position));
            score -= i64::from(rule.pre_penalty);
        }
    }

    check_minimums(content.trim(), &mut issues, &mut score);
    finish(score, issues, None)
}

/// Validate formatted content as the final gate.
///
/// Re-checks only the rules that carry a post-formatting penalty. `is_valid`
/// additionally requires `score >= acceptance_threshold`.
pub fn post_validate(content: &str, acceptance_threshold: u32) -> QualityResult {
    if let Some(fatal) = fatal_content_issue(content) {
        return rejected(fatal);
    }

    let mut score: i64 = 100;
    let mut issues = Vec::new();

    for rule in ARTIFACT_RULES.iter() {
        let Some(penalty) = rule.post_penalty else {
            continue;
        };
        if let Some(position) = rule.find(content) {
            issues.push(artifact_issue(rule, position));
            score -= i64::from(penalty);
        }
    }

    check_minimums(content.trim(), &mut issues, &mut score);
    finish(score, issues, Some(acceptance_threshold))
}

/// `EMPTY` or `GARBAGE_CONTENT`, if the content is not worth correcting.
fn fatal_content_issue(content: &str) -> Option<QualityIssue> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Some(error_issue(CODE_EMPTY, "Content is empty".to_string()));
    }
    rules::match_garbage(trimmed).map(|garbage| {
        error_issue(
            CODE_GARBAGE,
            format!("Content contains only {}", garbage.label),
        )
    })
}

fn check_minimums(trimmed: &str, issues: &mut Vec<QualityIssue>, score: &mut i64) {
    let length = trimmed.chars().count();
    if length < MIN_CONTENT_LENGTH {
        issues.push(error_issue(
            CODE_TOO_SHORT,
            format!(
                "Content too short ({} characters, minimum {})",
                length, MIN_CONTENT_LENGTH
            ),
        ));
        *score -= i64::from(TOO_SHORT_PENALTY);
    }

    let letters = rules::count_letters(trimmed);
    if letters < MIN_LETTER_COUNT {
        issues.push(error_issue(
            CODE_TOO_FEW_LETTERS,
            format!(
                "Too few letters ({}, minimum {})",
                letters, MIN_LETTER_COUNT
            ),
        ));
        *score -= i64::from(TOO_FEW_LETTERS_PENALTY);
    }

    let words = rules::count_words(trimmed);
    if words < MIN_WORD_COUNT {
        issues.push(error_issue(
            CODE_TOO_FEW_WORDS,
            format!("Too few words ({}, minimum {})", words, MIN_WORD_COUNT),
        ));
        *score -= i64::from(TOO_FEW_WORDS_PENALTY);
    }
}

fn finish(score: i64, issues: Vec<QualityIssue>, threshold: Option<u32>) -> QualityResult {
    let has_fatal = issues.iter().any(QualityIssue::is_fatal);
    let score = if has_fatal {
        0
    } else {
        score.clamp(0, 100) as u32
    };
    let is_valid = !has_fatal && threshold.map_or(true, |t| score >= t);

    QualityResult {
        is_valid,
        score,
        issues,
        corrections: Vec::new(),
    }
}

fn rejected(issue: QualityIssue) -> QualityResult {
    QualityResult {
        is_valid: false,
        score: 0,
        issues: vec![issue],
        corrections: Vec::new(),
    }
}

fn artifact_issue(rule: &ArtifactRule, position: usize) -> QualityIssue {
    QualityIssue {
        code: rule.code.to_string(),
        severity: rule.severity,
        description: rule.description.to_string(),
        auto_fixable: true,
        position: Some(position),
    }
}

fn error_issue(code: &str, description: String) -> QualityIssue {
    QualityIssue {
        code: code.to_string(),
        severity: Severity::Error,
        description,
        auto_fixable: false,
        position: None,
    }
}
