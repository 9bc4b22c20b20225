//! Storage abstraction for Postline.
//!
//! The [`Store`] trait defines every persisted-record operation needed by the
//! import orchestrator, the retry scheduler, and the retry worker, enabling
//! pluggable backends (SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes. Each
//! method is expected to be atomic on its own; no cross-call transactions are
//! required.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Client, HealthSummary, NewPost, Operation, OperationCounts, OperationKind, OperationStatus,
    Post, QueueCounts,
};

/// Abstract storage backend for operations, posts, and clients.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_operation`](Store::create_operation) | Start a run (`processing`, total 0) |
/// | [`update_operation_total`](Store::update_operation_total) | Record the chunk count |
/// | [`complete_operation`](Store::complete_operation) | Final counts + derived status |
/// | [`fail_operation`](Store::fail_operation) | Terminal failure before per-post processing |
/// | [`create_post`](Store::create_post) | One row per chunk |
/// | [`mark_post_sent`](Store::mark_post_sent) | Delivery succeeded |
/// | [`mark_post_failed`](Store::mark_post_failed) | Delivery failed, retry scheduled |
/// | [`mark_post_permanently_failed`](Store::mark_post_permanently_failed) | Retries exhausted |
/// | [`posts_due_for_retry`](Store::posts_due_for_retry) | Worker batch query |
/// | [`queue_counts`](Store::queue_counts) / [`health_summary`](Store::health_summary) | Observability |
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a delivery target and its credential.
    async fn create_client(&self, name: &str, credential: &str) -> Result<Client>;

    async fn get_client(&self, id: &str) -> Result<Option<Client>>;

    async fn list_clients(&self) -> Result<Vec<Client>>;

    /// Insert an operation with `status = processing` and `total_posts = 0`.
    async fn create_operation(
        &self,
        client_ref: &str,
        kind: OperationKind,
        source_ref: &str,
    ) -> Result<String>;

    /// Set `total_posts` once the chunk count is known.
    async fn update_operation_total(&self, id: &str, total: i64) -> Result<()>;

    /// Store final counts, derive the terminal status, and stamp `completed_at`.
    async fn complete_operation(&self, id: &str, counts: &OperationCounts)
        -> Result<OperationStatus>;

    /// Mark an operation `failed` with an error message.
    async fn fail_operation(&self, id: &str, message: &str) -> Result<()>;

    async fn get_operation(&self, id: &str) -> Result<Option<Operation>>;

    /// Most recent operations first.
    async fn list_operations(&self, limit: i64) -> Result<Vec<Operation>>;

    async fn create_post(
        &self,
        operation_ref: &str,
        client_ref: &str,
        post: &NewPost,
    ) -> Result<String>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>>;

    /// Posts of one operation in creation (chunk) order.
    async fn list_posts(&self, operation_ref: &str) -> Result<Vec<Post>>;

    /// `sent`, with the publisher's response and `sent_at`; clears `next_retry_at`.
    async fn mark_post_sent(&self, id: &str, response: &str) -> Result<()>;

    /// `failed`, increments `retry_count`, and sets `next_retry_at`.
    async fn mark_post_failed(
        &self,
        id: &str,
        message: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()>;

    /// `permanently_failed`; clears `next_retry_at`.
    async fn mark_post_permanently_failed(&self, id: &str, message: &str) -> Result<()>;

    /// `failed` posts with `next_retry_at <= now`, oldest deadline first.
    async fn posts_due_for_retry(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Post>>;

    async fn queue_counts(&self) -> Result<QueueCounts>;

    /// Summary over posts created at or after `since`.
    async fn health_summary(&self, since: DateTime<Utc>) -> Result<HealthSummary>;
}

/// Build a [`HealthSummary`] from `(status, quality_score, had_corrections)` rows.
pub fn summarize_health<I>(rows: I) -> HealthSummary
where
    I: IntoIterator<Item = (crate::models::PostStatus, u32, bool)>,
{
    use crate::models::PostStatus;

    let mut summary = HealthSummary::default();
    let mut score_total: u64 = 0;

    for (status, score, corrected) in rows {
        summary.total_posts += 1;
        score_total += u64::from(score);
        match status {
            PostStatus::Sent => summary.sent += 1,
            PostStatus::Rejected => summary.rejected += 1,
            _ => {}
        }
        if corrected {
            summary.corrected += 1;
        }
    }

    if summary.total_posts > 0 {
        summary.success_rate = summary.sent as f64 / summary.total_posts as f64;
        summary.average_quality_score = score_total as f64 / summary.total_posts as f64;
    }
    summary
}
