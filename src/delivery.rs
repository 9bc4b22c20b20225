//! Delivering one post and recording the outcome.
//!
//! [`deliver_post`] wraps a [`Publisher`] call in a timeout and classifies
//! the result into a typed [`DeliveryError`]. [`deliver_and_record`] is the
//! shared path used by both the import orchestrator and the retry worker:
//! resolve the client credential, deliver, then either `mark_post_sent` or
//! hand the failure to the retry scheduler.

use anyhow::Result;
use std::time::Duration;
use thiserror::Error;

use postline_core::publish::{DeliveryResponse, Publisher};
use postline_core::retry::{add_to_retry_queue, RetryOutcome};

use crate::context::AppContext;

/// Why a delivery attempt did not succeed. Every variant is retryable.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Publisher answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection refused, DNS failure, TLS error.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The post's client no longer resolves to a credential.
    #[error("Client not found: {0}")]
    MissingClient(String),
}

/// Outcome of [`deliver_and_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(RetryOutcome),
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

/// Send `text` under `timeout`. Only a 2xx response is `Ok`.
pub async fn deliver_post(
    publisher: &dyn Publisher,
    credential: &str,
    text: &str,
    timeout: Duration,
) -> Result<DeliveryResponse, DeliveryError> {
    let response = tokio::time::timeout(timeout, publisher.deliver(credential, text))
        .await
        .map_err(|_| DeliveryError::Timeout(timeout))?
        .map_err(|e| DeliveryError::Transport(e.to_string()))?;

    if !response.is_success() {
        return Err(DeliveryError::Http {
            status: response.status_code,
            body: response.body,
        });
    }
    Ok(response)
}

/// Deliver a stored post and persist the result.
///
/// Delivery failures are recorded through the retry scheduler and reported
/// as [`DeliveryOutcome::Failed`]; only store errors are returned as `Err`.
pub async fn deliver_and_record(
    ctx: &AppContext,
    post_id: &str,
    client_ref: &str,
    text: &str,
) -> Result<DeliveryOutcome> {
    let attempt = match ctx.store.get_client(client_ref).await? {
        Some(client) => {
            deliver_post(
                ctx.publisher.as_ref(),
                &client.credential,
                text,
                ctx.delivery_timeout,
            )
            .await
        }
        None => Err(DeliveryError::MissingClient(client_ref.to_string())),
    };

    match attempt {
        Ok(response) => {
            ctx.store.mark_post_sent(post_id, &response.body).await?;
            tracing::info!(post_id = %post_id, status = response.status_code, "post delivered");
            Ok(DeliveryOutcome::Sent)
        }
        Err(e) => {
            let outcome = add_to_retry_queue(
                ctx.store.as_ref(),
                &ctx.retry,
                post_id,
                &e.to_string(),
                ctx.clock.now(),
            )
            .await?;
            Ok(DeliveryOutcome::Failed(outcome))
        }
    }
}
