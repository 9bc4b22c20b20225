//! Quality pipeline orchestration.
//!
//! Sequences the stages for one chunk:
//!
//! ```text
//! pre-validation ──fatal──▶ rejected (stage = pre-validation)
//!       │
//!       ▼
//! auto-correction ─▶ formatting ─▶ post-validation ─▶ complete
//!                                        │      ▲
//!                                        └──────┘  one extra correct+format
//!                                                  pass if fixable issues remain
//! ```
//!
//! A rejected chunk is a normal, reported outcome: callers branch on
//! [`PipelineResult::is_valid`]. The pipeline never fails on content.

use serde::{Deserialize, Serialize};

use crate::correct::{auto_correct, clean_whitespace, normalize_bullets};
use crate::format::format_post;
use crate::models::{PipelineResult, PipelineStage, QualityIssue, Severity};
use crate::validate::{post_validate, pre_validate};

/// Score blending and acceptance policy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pre_weight")]
    pub pre_weight: f64,
    #[serde(default = "default_post_weight")]
    pub post_weight: f64,
    /// Global acceptance floor applied by post-validation and the final score.
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: u32,
}

fn default_pre_weight() -> f64 {
    0.3
}
fn default_post_weight() -> f64 {
    0.7
}
fn default_acceptance_threshold() -> u32 {
    50
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pre_weight: default_pre_weight(),
            post_weight: default_post_weight(),
            acceptance_threshold: default_acceptance_threshold(),
        }
    }
}

impl PipelineConfig {
    /// `round(pre * pre_weight + post * post_weight)`, clamped to `[0, 100]`.
    pub fn blend(&self, pre_score: u32, post_score: u32) -> u32 {
        let blended = f64::from(pre_score) * self.pre_weight + f64::from(post_score) * self.post_weight;
        blended.round().clamp(0.0, 100.0) as u32
    }
}

/// Run one raw chunk through the pipeline with the default configuration.
pub fn run_quality_pipeline(raw: &str) -> PipelineResult {
    run_quality_pipeline_with(raw, &PipelineConfig::default())
}

/// Run one raw chunk through the pipeline.
pub fn run_quality_pipeline_with(raw: &str, config: &PipelineConfig) -> PipelineResult {
    let pre = pre_validate(raw);
    if pre.has_fatal() {
        let reason = join_descriptions(pre.issues.iter().filter(|i| i.is_fatal()));
        return PipelineResult {
            original_content: raw.to_string(),
            processed_content: raw.trim().to_string(),
            is_valid: false,
            quality_score: pre.score,
            all_issues: pre.issues,
            corrections: Vec::new(),
            stage: PipelineStage::PreValidation,
            rejection_reason: Some(reason),
        };
    }

    let first = auto_correct(raw, &pre.issues);
    let mut corrections = first.corrections;
    let cleaned = clean_whitespace(&normalize_bullets(&first.content));

    let mut formatted = format_post(&cleaned);

    let post = post_validate(&formatted, config.acceptance_threshold);
    if post.fixable_issues().next().is_some() {
        let second = auto_correct(&formatted, &post.issues);
        corrections.extend(second.corrections);
        formatted = format_post(&second.content);
    }

    let quality_score = if post.has_fatal() {
        0
    } else {
        config.blend(pre.score, post.score)
    };
    let is_valid = post.is_valid && quality_score >= config.acceptance_threshold;

    let mut all_issues = pre.issues;
    all_issues.extend(post.issues);

    let rejection_reason = if is_valid {
        None
    } else {
        let errors: Vec<&QualityIssue> = all_issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .collect();
        if errors.is_empty() {
            Some(format!("Quality score too low ({}/100)", quality_score))
        } else {
            Some(join_descriptions(errors.into_iter()))
        }
    };

    PipelineResult {
        original_content: raw.to_string(),
        processed_content: formatted,
        is_valid,
        quality_score,
        all_issues,
        corrections: dedup_preserving_order(corrections),
        stage: PipelineStage::Complete,
        rejection_reason,
    }
}

fn join_descriptions<'a>(issues: impl Iterator<Item = &'a QualityIssue>) -> String {
    issues
        .map(|i| i.description.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
