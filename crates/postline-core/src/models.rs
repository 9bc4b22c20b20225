//! Core data models used throughout Postline.
//!
//! These types represent the chunks, quality findings, pipeline results,
//! operations, and posts that flow through the import and delivery pipeline.
//! Status enums serialize to the lowercase strings stored in the database,
//! which is the compatibility surface other tooling reads.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One candidate post's raw text, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub index: usize,
    pub text: String,
}

/// Severity of a [`QualityIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single finding produced by the pre- or post-validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub code: String,
    pub severity: Severity,
    pub description: String,
    pub auto_fixable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl QualityIssue {
    /// `error` severity with no automatic repair.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error && !self.auto_fixable
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityResult {
    pub is_valid: bool,
    pub score: u32,
    pub issues: Vec<QualityIssue>,
    pub corrections: Vec<String>,
}

impl QualityResult {
    pub fn has_fatal(&self) -> bool {
        self.issues.iter().any(QualityIssue::is_fatal)
    }

    pub fn fixable_issues(&self) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(|i| i.auto_fixable)
    }
}

/// Where the quality pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    PreValidation,
    AutoCorrection,
    Formatting,
    PostValidation,
    Complete,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::PreValidation => "pre-validation",
            PipelineStage::AutoCorrection => "auto-correction",
            PipelineStage::Formatting => "formatting",
            PipelineStage::PostValidation => "post-validation",
            PipelineStage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Terminal result of running one chunk through the quality pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub original_content: String,
    pub processed_content: String,
    pub is_valid: bool,
    pub quality_score: u32,
    pub all_issues: Vec<QualityIssue>,
    pub corrections: Vec<String>,
    pub stage: PipelineStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Implements `Display`/`FromStr` over the lowercase database spelling.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> anyhow::Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => bail!("unknown {}: '{}'", stringify!($name), other),
                }
            }
        }
    };
}

/// How an operation's document was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    File,
    Url,
    Text,
}

string_enum!(OperationKind {
    File => "file",
    Url => "url",
    Text => "text",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Partial,
    Failed,
}

string_enum!(OperationStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Partial => "partial",
    Failed => "failed",
});

impl OperationStatus {
    /// Terminal status derived from final per-post counts.
    pub fn from_counts(counts: &OperationCounts) -> Self {
        if counts.failed == 0 && counts.rejected == 0 {
            OperationStatus::Completed
        } else if counts.successful > 0 {
            OperationStatus::Partial
        } else {
            OperationStatus::Failed
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Partial | OperationStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Queued,
    Sent,
    Failed,
    Rejected,
    PermanentlyFailed,
}

string_enum!(PostStatus {
    Queued => "queued",
    Sent => "sent",
    Failed => "failed",
    Rejected => "rejected",
    PermanentlyFailed => "permanently_failed",
});

/// Final per-post tallies for [`Store::complete_operation`](crate::store::Store::complete_operation).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub successful: i64,
    pub failed: i64,
    pub corrected: i64,
    pub rejected: i64,
}

/// One "import a document and deliver its posts" run.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub id: String,
    pub client_ref: String,
    pub kind: OperationKind,
    pub source_ref: String,
    pub total_posts: i64,
    pub success_count: i64,
    pub fail_count: i64,
    pub corrected_count: i64,
    pub rejected_count: i64,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields supplied when a post row is first written.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub original_content: String,
    pub processed_content: String,
    pub quality_score: u32,
    pub issues: Vec<QualityIssue>,
    pub corrections: Vec<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Seed a post from its pipeline outcome: `queued` if valid, `rejected` otherwise.
    pub fn from_pipeline(result: &PipelineResult, scheduled_for: Option<DateTime<Utc>>) -> Self {
        Self {
            original_content: result.original_content.clone(),
            processed_content: result.processed_content.clone(),
            quality_score: result.quality_score,
            issues: result.all_issues.clone(),
            corrections: result.corrections.clone(),
            status: if result.is_valid {
                PostStatus::Queued
            } else {
                PostStatus::Rejected
            },
            scheduled_for,
        }
    }
}

/// One persisted candidate publication.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: String,
    pub operation_ref: String,
    pub client_ref: String,
    pub original_content: String,
    pub processed_content: String,
    pub quality_score: u32,
    pub issues: Vec<QualityIssue>,
    pub corrections: Vec<String>,
    pub status: PostStatus,
    pub external_response: Option<String>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A delivery target and its publishing credential.
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub credential: String,
    pub created_at: DateTime<Utc>,
}

/// Post counts grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub queued: i64,
    pub sent: i64,
    pub failed: i64,
    pub rejected: i64,
    pub permanently_failed: i64,
}

impl QueueCounts {
    pub fn add(&mut self, status: PostStatus, n: i64) {
        match status {
            PostStatus::Queued => self.queued += n,
            PostStatus::Sent => self.sent += n,
            PostStatus::Failed => self.failed += n,
            PostStatus::Rejected => self.rejected += n,
            PostStatus::PermanentlyFailed => self.permanently_failed += n,
        }
    }
}

/// Rolling observability summary over a trailing window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total_posts: i64,
    pub sent: i64,
    pub success_rate: f64,
    pub average_quality_score: f64,
    pub corrected: i64,
    pub rejected: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(successful: i64, failed: i64, rejected: i64) -> OperationCounts {
        OperationCounts {
            successful,
            failed,
            corrected: 0,
            rejected,
        }
    }

    #[test]
    fn test_operation_status_from_counts() {
        assert_eq!(
            OperationStatus::from_counts(&counts(3, 0, 0)),
            OperationStatus::Completed
        );
        assert_eq!(
            OperationStatus::from_counts(&counts(2, 1, 0)),
            OperationStatus::Partial
        );
        assert_eq!(
            OperationStatus::from_counts(&counts(2, 0, 1)),
            OperationStatus::Partial
        );
        assert_eq!(
            OperationStatus::from_counts(&counts(0, 1, 1)),
            OperationStatus::Failed
        );
        assert_eq!(
            OperationStatus::from_counts(&counts(0, 0, 2)),
            OperationStatus::Failed
        );
    }

    #[test]
    fn test_status_strings_round_trip_database_spelling() {
        assert_eq!(PostStatus::PermanentlyFailed.as_str(), "permanently_failed");
        assert_eq!(
            "permanently_failed".parse::<PostStatus>().unwrap(),
            PostStatus::PermanentlyFailed
        );
        assert_eq!("partial".parse::<OperationStatus>().unwrap(), OperationStatus::Partial);
        assert!("shipped".parse::<PostStatus>().is_err());
    }

    #[test]
    fn test_issue_json_uses_lowercase_severity() {
        let issue = QualityIssue {
            code: "HTML_ENTITY".to_string(),
            severity: Severity::Info,
            description: "HTML entities present".to_string(),
            auto_fixable: true,
            position: None,
        };
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"severity\":\"info\""));
        assert!(!json.contains("position"));
    }
}
