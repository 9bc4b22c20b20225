//! Publishing abstraction.
//!
//! The external publishing API is a single operation: send text with a
//! per-client credential, get back a status code and body. Anything that is
//! not a 2xx response is a delivery failure handled by the retry scheduler.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Raw response from the publishing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResponse {
    pub status_code: u16,
    pub body: String,
}

impl DeliveryResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Sends post text to the external publishing API.
///
/// Transport failures are returned as `Err`; HTTP-level failures are returned
/// as `Ok` with a non-2xx [`DeliveryResponse::status_code`].
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn deliver(&self, credential: &str, text: &str) -> Result<DeliveryResponse>;
}
