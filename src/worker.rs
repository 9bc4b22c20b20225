//! Retry worker service.
//!
//! The `RetryWorker` is a long-running service that:
//! - Ticks every `interval` (default 15s)
//! - Fetches up to `batch_size` posts whose `next_retry_at` has passed
//! - Re-resolves each post's client credential and re-delivers it
//! - Marks posts sent, or hands failures back to the retry scheduler
//!
//! # Architecture
//!
//! ```text
//! RetryWorker
//!     │
//!     ├─► posts_due_for_retry (oldest deadline first)
//!     ├─► deliver_and_record (per post, inter_post_delay apart)
//!     │       ├─► mark_post_sent
//!     │       └─► add_to_retry_queue → failed | permanently_failed
//!     └─► record TickReport
//! ```
//!
//! State lives in an explicit [`WorkerState`] owned by the worker. The
//! in-flight flag only prevents overlapping ticks: a tick that starts while
//! another is running is skipped entirely. Stopping the worker halts future
//! ticks; a tick already in flight runs to completion.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use postline_core::models::QueueCounts;
use postline_core::retry::RetryOutcome;

use crate::config::{Config, RetryConfig};
use crate::context::AppContext;
use crate::delivery::{deliver_and_record, DeliveryOutcome};

/// Configuration for the retry worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Maximum posts retried per tick.
    pub batch_size: i64,
    /// Pause between consecutive deliveries within one tick.
    pub inter_post_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_retry_config(&RetryConfig::default())
    }
}

impl WorkerConfig {
    pub fn from_retry_config(retry: &RetryConfig) -> Self {
        Self {
            interval: retry.interval(),
            batch_size: retry.batch_size,
            inter_post_delay: retry.inter_post_delay(),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub started_at: Option<DateTime<Utc>>,
    pub attempted: usize,
    pub sent: usize,
    pub rescheduled: usize,
    pub exhausted: usize,
    /// Posts skipped because the store failed mid-delivery.
    pub errors: usize,
}

/// Snapshot returned by [`RetryWorker::status`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub running: bool,
    pub processing: bool,
    pub queue: QueueCounts,
    pub last_tick: Option<TickReport>,
}

/// Mutable worker state.
#[derive(Default)]
pub struct WorkerState {
    running: AtomicBool,
    processing: AtomicBool,
    /// Bumped on every start so a stale loop exits after a stop/start.
    generation: AtomicU64,
    wake: Notify,
    last_tick: Mutex<Option<TickReport>>,
}

/// Clears the in-flight flag when a tick ends, including on panic.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodic drain of due retries. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RetryWorker {
    ctx: AppContext,
    config: WorkerConfig,
    state: Arc<WorkerState>,
}

impl RetryWorker {
    pub fn new(ctx: AppContext, config: WorkerConfig) -> Self {
        Self {
            ctx,
            config,
            state: Arc::new(WorkerState::default()),
        }
    }

    /// Begin ticking in a background task. Returns `false` if already running.
    pub fn start(&self) -> bool {
        if self.state.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "retry worker starting"
        );

        let worker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(worker.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = worker.state.wake.notified() => {}
                }
                if !worker.is_current(generation) {
                    break;
                }
                if let Err(e) = worker.tick().await {
                    error!(error = %e, "retry tick failed");
                }
            }

            info!("retry worker stopped");
        });

        true
    }

    /// Stop future ticks. An in-flight tick completes.
    pub fn stop(&self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            self.state.wake.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        self.state.processing.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.state.generation.load(Ordering::SeqCst) == generation
    }

    pub fn last_tick(&self) -> Option<TickReport> {
        self.state
            .last_tick
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn status(&self) -> Result<WorkerStatus> {
        Ok(WorkerStatus {
            running: self.is_running(),
            processing: self.is_processing(),
            queue: self.ctx.store.queue_counts().await?,
            last_tick: self.last_tick(),
        })
    }

    /// Run one tick now, independent of the timer.
    pub async fn trigger_now(&self) -> Result<Option<TickReport>> {
        self.tick().await
    }

    /// Drain one batch of due retries.
    ///
    /// Returns `None` without doing anything if another tick is in flight.
    pub async fn tick(&self) -> Result<Option<TickReport>> {
        if self.state.processing.swap(true, Ordering::SeqCst) {
            debug!("retry tick skipped, previous tick still in flight");
            return Ok(None);
        }
        let _in_flight = InFlight(&self.state.processing);

        let report = self.drain_due().await?;
        *self
            .state
            .last_tick
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report.clone());
        Ok(Some(report))
    }

    async fn drain_due(&self) -> Result<TickReport> {
        let now = self.ctx.clock.now();
        let due = self
            .ctx
            .store
            .posts_due_for_retry(now, self.config.batch_size)
            .await?;

        let mut report = TickReport {
            started_at: Some(now),
            ..TickReport::default()
        };
        if due.is_empty() {
            return Ok(report);
        }
        debug!(count = due.len(), "retrying due posts");

        for (i, post) in due.iter().enumerate() {
            if i > 0 && !self.config.inter_post_delay.is_zero() {
                tokio::time::sleep(self.config.inter_post_delay).await;
            }
            report.attempted += 1;

            match deliver_and_record(
                &self.ctx,
                &post.id,
                &post.client_ref,
                &post.processed_content,
            )
            .await
            {
                Ok(DeliveryOutcome::Sent) => report.sent += 1,
                Ok(DeliveryOutcome::Failed(RetryOutcome::Scheduled { .. })) => {
                    report.rescheduled += 1
                }
                Ok(DeliveryOutcome::Failed(RetryOutcome::Exhausted { .. })) => {
                    report.exhausted += 1
                }
                Err(e) => {
                    error!(post_id = %post.id, error = %e, "failed to record retry outcome");
                    report.errors += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            sent = report.sent,
            rescheduled = report.rescheduled,
            exhausted = report.exhausted,
            "retry tick finished"
        );
        Ok(report)
    }
}

// ============ CLI commands ============

pub async fn run_once_cmd(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let worker = RetryWorker::new(ctx, WorkerConfig::from_retry_config(&config.retry));

    if let Some(report) = worker.tick().await? {
        println!("retry run-once");
        println!("  attempted: {}", report.attempted);
        println!("  sent: {}", report.sent);
        println!("  rescheduled: {}", report.rescheduled);
        println!("  permanently failed: {}", report.exhausted);
        if report.errors > 0 {
            println!("  errors: {}", report.errors);
        }
    }
    Ok(())
}

pub async fn run_worker_cmd(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let worker = RetryWorker::new(ctx, WorkerConfig::from_retry_config(&config.retry));

    worker.start();
    println!(
        "Retry worker running every {}s (Ctrl-C to stop)",
        config.retry.interval_secs
    );
    tokio::signal::ctrl_c().await?;
    worker.stop();
    Ok(())
}
