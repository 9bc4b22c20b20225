//! Queue and delivery-health overview.
//!
//! Summarizes post counts by status, the rolling health window (success
//! rate, average quality score, corrected and rejected counts), and the most
//! recent operations. Used by `postline status` and `GET /status`. These
//! figures are observability only; nothing reads them to make decisions.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use postline_core::models::{HealthSummary, Operation, QueueCounts};

use crate::config::Config;
use crate::context::AppContext;

const RECENT_OPERATIONS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub queue: QueueCounts,
    pub window_hours: i64,
    pub health: HealthSummary,
    pub recent_operations: Vec<Operation>,
}

pub async fn status_report(ctx: &AppContext, window_hours: i64) -> Result<StatusReport> {
    let since = ctx.clock.now() - Duration::hours(window_hours);
    Ok(StatusReport {
        queue: ctx.store.queue_counts().await?,
        window_hours,
        health: ctx.store.health_summary(since).await?,
        recent_operations: ctx.store.list_operations(RECENT_OPERATIONS).await?,
    })
}

/// Run the status command: query the store and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let report = status_report(&ctx, config.health.window_hours).await?;
    let q = &report.queue;
    let h = &report.health;

    println!("Postline — Status");
    println!("=================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!();
    println!("  Queued:              {}", q.queued);
    println!("  Sent:                {}", q.sent);
    println!("  Failed (retrying):   {}", q.failed);
    println!("  Permanently failed:  {}", q.permanently_failed);
    println!("  Rejected:            {}", q.rejected);
    println!();
    println!("  Last {}h:", report.window_hours);
    println!("    posts:             {}", h.total_posts);
    println!("    success rate:      {:.1}%", h.success_rate * 100.0);
    println!("    avg quality score: {:.1}", h.average_quality_score);
    println!("    corrected:         {}", h.corrected);
    println!("    rejected:          {}", h.rejected);

    if !report.recent_operations.is_empty() {
        println!();
        println!("  Recent operations:");
        println!(
            "  {:<36} {:<10} {:>5} {:>5} {:>5} {:>5}   {}",
            "ID", "STATUS", "POSTS", "SENT", "FAIL", "REJ", "STARTED"
        );
        println!("  {}", "-".repeat(92));
        for op in &report.recent_operations {
            println!(
                "  {:<36} {:<10} {:>5} {:>5} {:>5} {:>5}   {}",
                op.id,
                op.status,
                op.total_posts,
                op.success_count,
                op.fail_count,
                op.rejected_count,
                format_relative(op.started_at, Utc::now())
            );
        }
    }

    println!();
    Ok(())
}

/// Format a timestamp relative to `now` (e.g. "3 hours ago").
fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();

    if delta < 0 {
        return format_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_iso(ts)
    }
}

fn format_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
