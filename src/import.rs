//! Import orchestration.
//!
//! Drives one "import a document, deliver its posts" run:
//!
//! ```text
//! verify client ─▶ create operation ─▶ acquire ─▶ chunk ─▶ per chunk:
//!                                         │          │      pipeline → create_post
//!                                         ▼          ▼      → deliver (valid only)
//!                                  fail_operation (no posts)   │
//!                                                              ▼
//!                                                    complete_operation
//! ```
//!
//! Delivery failures go to the retry scheduler and are counted as failed;
//! operation counts are not revisited when a later retry succeeds. A store
//! error while handling one post counts that post as failed and processing
//! continues, so the final counts always add up to the chunk total.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use postline_core::chunk::chunk_document;
use postline_core::models::{NewPost, OperationCounts, OperationStatus, PipelineResult, RawChunk};
use postline_core::retry::add_to_retry_queue;
use postline_core::{run_quality_pipeline_with, PipelineConfig};

use crate::config::Config;
use crate::context::AppContext;
use crate::delivery::{deliver_and_record, DeliveryOutcome};
use crate::source::DocumentSource;

pub const NO_CHUNKS_MESSAGE: &str = "Document produced no post chunks";

/// The import named a client that is not registered.
#[derive(Debug, Error)]
#[error("client not found: {0}")]
pub struct ClientNotFound(pub String);

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub client_id: String,
    pub source: DocumentSource,
    /// Requested publish time; recorded on every post, not acted on.
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Summary of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub operation_id: String,
    pub status: OperationStatus,
    pub total_posts: i64,
    pub successful: i64,
    pub failed: i64,
    pub corrected: i64,
    pub rejected: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ImportReport {
    fn failed(operation_id: String, message: String) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Failed,
            total_posts: 0,
            successful: 0,
            failed: 0,
            corrected: 0,
            rejected: 0,
            error_message: Some(message),
        }
    }
}

/// Run a full import.
///
/// A missing client is an error and creates no operation. Acquisition
/// failures and documents with no chunks end the operation as `failed` and
/// are reported, not returned as errors. A store failure on one post counts
/// that post as failed and the run continues; a store failure on the
/// operation record itself marks it `failed` before the error is returned.
pub async fn run_import(ctx: &AppContext, request: &ImportRequest) -> Result<ImportReport> {
    let client = ctx
        .store
        .get_client(&request.client_id)
        .await?
        .ok_or_else(|| ClientNotFound(request.client_id.clone()))?;

    let operation_id = ctx
        .store
        .create_operation(
            &client.id,
            request.source.kind(),
            &request.source.source_ref(),
        )
        .await?;
    tracing::info!(
        operation_id = %operation_id,
        client_id = %client.id,
        kind = %request.source.kind(),
        "import started"
    );

    let document = match request.source.acquire(ctx.fetch_timeout).await {
        Ok(text) => text,
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!(operation_id = %operation_id, error = %message, "document acquisition failed");
            ctx.store.fail_operation(&operation_id, &message).await?;
            return Ok(ImportReport::failed(operation_id, message));
        }
    };

    let chunks = chunk_document(&document);
    if chunks.is_empty() {
        tracing::warn!(operation_id = %operation_id, "document produced no post chunks");
        ctx.store
            .fail_operation(&operation_id, NO_CHUNKS_MESSAGE)
            .await?;
        return Ok(ImportReport::failed(
            operation_id,
            NO_CHUNKS_MESSAGE.to_string(),
        ));
    }

    let total = chunks.len() as i64;
    let processed = async {
        ctx.store.update_operation_total(&operation_id, total).await?;
        let counts = process_chunks(ctx, &operation_id, &client.id, &chunks, request).await;
        let status = ctx.store.complete_operation(&operation_id, &counts).await?;
        Ok::<_, anyhow::Error>((counts, status))
    }
    .await;

    let (counts, status) = match processed {
        Ok(done) => done,
        Err(e) => {
            tracing::error!(operation_id = %operation_id, error = %e, "import aborted");
            if let Err(fail_err) = ctx
                .store
                .fail_operation(&operation_id, &e.to_string())
                .await
            {
                tracing::error!(
                    operation_id = %operation_id,
                    error = %fail_err,
                    "failed to mark operation as failed"
                );
            }
            return Err(e);
        }
    };

    tracing::info!(
        operation_id = %operation_id,
        status = %status,
        total,
        successful = counts.successful,
        failed = counts.failed,
        rejected = counts.rejected,
        "import finished"
    );

    Ok(ImportReport {
        operation_id,
        status,
        total_posts: total,
        successful: counts.successful,
        failed: counts.failed,
        corrected: counts.corrected,
        rejected: counts.rejected,
        error_message: None,
    })
}

async fn process_chunks(
    ctx: &AppContext,
    operation_id: &str,
    client_id: &str,
    chunks: &[RawChunk],
    request: &ImportRequest,
) -> OperationCounts {
    let mut counts = OperationCounts::default();

    for chunk in chunks {
        let result = run_quality_pipeline_with(&chunk.text, &ctx.pipeline);
        let post = NewPost::from_pipeline(&result, request.scheduled_for);
        let post_id = match ctx.store.create_post(operation_id, client_id, &post).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    operation_id = %operation_id,
                    chunk = chunk.index,
                    error = %e,
                    "failed to persist post"
                );
                counts.failed += 1;
                continue;
            }
        };

        if !result.is_valid {
            tracing::debug!(
                operation_id = %operation_id,
                post_id = %post_id,
                chunk = chunk.index,
                reason = result.rejection_reason.as_deref().unwrap_or_default(),
                "chunk rejected"
            );
            counts.rejected += 1;
            continue;
        }

        if !result.corrections.is_empty() {
            counts.corrected += 1;
        }

        match deliver_and_record(ctx, &post_id, client_id, &result.processed_content).await {
            Ok(DeliveryOutcome::Sent) => counts.successful += 1,
            Ok(DeliveryOutcome::Failed(_)) => counts.failed += 1,
            Err(e) => {
                tracing::error!(post_id = %post_id, error = %e, "recording delivery outcome failed");
                requeue_after_store_error(ctx, &post_id, &e).await;
                counts.failed += 1;
            }
        }
    }

    counts
}

/// Leave a post whose outcome could not be recorded in a state the worker
/// picks up: scheduled through the retry queue, or failing that `failed`
/// and due immediately.
async fn requeue_after_store_error(ctx: &AppContext, post_id: &str, error: &anyhow::Error) {
    let message = format!("{:#}", error);
    let now = ctx.clock.now();
    match add_to_retry_queue(ctx.store.as_ref(), &ctx.retry, post_id, &message, now).await {
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(post_id = %post_id, error = %e, "retry scheduling failed, marking post due now");
            if let Err(e) = ctx.store.mark_post_failed(post_id, &message, now).await {
                tracing::error!(post_id = %post_id, error = %e, "post left without a retry deadline");
            }
        }
    }
}

/// Pipeline outcome for one chunk of a previewed document.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPreview {
    pub index: usize,
    #[serde(flatten)]
    pub result: PipelineResult,
}

/// Chunk and score a document without persisting or delivering anything.
pub fn preview(document: &str, config: &PipelineConfig) -> Vec<ChunkPreview> {
    chunk_document(document)
        .into_iter()
        .map(|chunk| ChunkPreview {
            index: chunk.index,
            result: run_quality_pipeline_with(&chunk.text, config),
        })
        .collect()
}

// ============ CLI commands ============

pub async fn run_import_cmd(config: &Config, request: ImportRequest) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let report = run_import(&ctx, &request).await?;

    println!("import {}", request.source.source_ref());
    println!("  operation: {}", report.operation_id);
    println!("  status: {}", report.status);
    if let Some(message) = &report.error_message {
        println!("  error: {}", message);
        return Ok(());
    }
    println!("  posts: {}", report.total_posts);
    println!("  sent: {}", report.successful);
    println!("  failed (retry scheduled): {}", report.failed);
    println!("  rejected: {}", report.rejected);
    println!("  corrected: {}", report.corrected);
    Ok(())
}

pub async fn run_preview_cmd(config: &Config, source: DocumentSource) -> Result<()> {
    let document = source
        .acquire(std::time::Duration::from_secs(config.fetch.timeout_secs))
        .await?;
    let previews = preview(&document, &config.pipeline);

    if previews.is_empty() {
        println!("{}", NO_CHUNKS_MESSAGE);
        return Ok(());
    }

    let accepted = previews.iter().filter(|p| p.result.is_valid).count();
    for p in &previews {
        let r = &p.result;
        let verdict = if r.is_valid { "accepted" } else { "rejected" };
        println!(
            "#{} {} score={} stage={}",
            p.index, verdict, r.quality_score, r.stage
        );
        for correction in &r.corrections {
            println!("    fixed: {}", correction);
        }
        if let Some(reason) = &r.rejection_reason {
            println!("    reason: {}", reason);
        }
        for line in r.processed_content.lines() {
            println!("    | {}", line);
        }
    }
    println!(
        "{} chunks: {} accepted, {} rejected",
        previews.len(),
        accepted,
        previews.len() - accepted
    );
    Ok(())
}

pub async fn run_operation_cmd(config: &Config, id: &str) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let op = ctx
        .store
        .get_operation(id)
        .await?
        .ok_or_else(|| anyhow!("operation not found: {}", id))?;
    let posts = ctx.store.list_posts(id).await?;

    println!("operation {}", op.id);
    println!("  client: {}", op.client_ref);
    println!("  source: {} ({})", op.source_ref, op.kind);
    println!("  status: {}", op.status);
    println!(
        "  posts: {} (sent {}, failed {}, rejected {}, corrected {})",
        op.total_posts, op.success_count, op.fail_count, op.rejected_count, op.corrected_count
    );
    if let Some(message) = &op.error_message {
        println!("  error: {}", message);
    }
    println!("  started: {}", op.started_at.to_rfc3339());
    if let Some(done) = op.completed_at {
        println!("  completed: {}", done.to_rfc3339());
    }

    for (i, post) in posts.iter().enumerate() {
        let retry = match post.next_retry_at {
            Some(at) => format!(" next retry {}", at.to_rfc3339()),
            None => String::new(),
        };
        println!(
            "  [{}] {} score={} retries={}{}",
            i, post.status, post.quality_score, post.retry_count, retry
        );
    }
    Ok(())
}
