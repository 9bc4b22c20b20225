//! Retry scheduling for failed deliveries.
//!
//! [`add_to_retry_queue`] is the only place where retry-count growth and the
//! transition to `permanently_failed` are decided. Delivery call sites report
//! failures here and never touch `retry_count` themselves.
//!
//! # Backoff
//!
//! The k-th scheduled retry waits `backoff_secs[min(k - 1, len - 1)]` seconds.
//! With the default table that is 30s, 1m, 2m, 5m, 10m, 30m, 1h; the table
//! length is also the maximum number of retries.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Store;

/// Default backoff table in seconds.
pub const DEFAULT_BACKOFF_SECS: [u64; 7] = [30, 60, 120, 300, 600, 1800, 3600];

/// Fixed backoff table; its length is the retry limit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    pub backoff_secs: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(backoff_secs: Vec<u64>) -> Self {
        Self { backoff_secs }
    }

    pub fn max_retries(&self) -> u32 {
        self.backoff_secs.len() as u32
    }

    /// Delay before the `attempt`-th retry (1-based). Attempts past the end
    /// of the table reuse its last entry.
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let last = self.backoff_secs.len().saturating_sub(1);
        let index = (attempt.max(1) as usize - 1).min(last);
        let secs = self.backoff_secs.get(index).copied().unwrap_or(0);
        std::time::Duration::from_secs(secs)
    }
}

/// What [`add_to_retry_queue`] decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// Post is `failed` and will be retried at `next_retry_at`.
    Scheduled {
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// Retries exhausted; post is now `permanently_failed`.
    Exhausted { retry_count: u32 },
}

impl RetryOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, RetryOutcome::Scheduled { .. })
    }
}

/// Record a delivery failure for `post_id` and schedule its next attempt.
///
/// Loads the post and computes `retry_count + 1`. Past the retry limit the
/// post is marked `permanently_failed`; otherwise it is marked `failed` with
/// `next_retry_at = now + delay`.
pub async fn add_to_retry_queue(
    store: &dyn Store,
    policy: &RetryPolicy,
    post_id: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<RetryOutcome> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| anyhow!("post not found: {}", post_id))?;

    let new_retry_count = post.retry_count + 1;
    if new_retry_count > policy.max_retries() {
        store
            .mark_post_permanently_failed(post_id, error_message)
            .await?;
        tracing::warn!(
            post_id = %post_id,
            retry_count = post.retry_count,
            error = %error_message,
            "retries exhausted, post permanently failed"
        );
        return Ok(RetryOutcome::Exhausted {
            retry_count: post.retry_count,
        });
    }

    let delay = policy.delay_for(new_retry_count);
    let next_retry_at = now + Duration::from_std(delay)?;
    store
        .mark_post_failed(post_id, error_message, next_retry_at)
        .await?;
    tracing::info!(
        post_id = %post_id,
        retry_count = new_retry_count,
        delay_secs = delay.as_secs(),
        "delivery failed, retry scheduled"
    );

    Ok(RetryOutcome::Scheduled {
        retry_count: new_retry_count,
        next_retry_at,
    })
}
