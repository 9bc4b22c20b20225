//! HTTP implementation of the [`Publisher`] trait.
//!
//! Sends `POST <endpoint>` with a JSON body `{"text": "..."}` and the
//! client's credential as a bearer token. Any HTTP response, success or not,
//! comes back as a [`DeliveryResponse`]; only transport failures are errors.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use postline_core::publish::{DeliveryResponse, Publisher};

use crate::config::PublisherConfig;

pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &PublisherConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.timeout())
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn deliver(&self, credential: &str, text: &str) -> Result<DeliveryResponse> {
        let body = serde_json::json!({ "text": text });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", credential))
            .json(&body)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(DeliveryResponse { status_code, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let publisher =
            HttpPublisher::new("http://127.0.0.1:9/posts", Duration::from_secs(2)).unwrap();
        assert!(publisher.deliver("token", "hello").await.is_err());
    }
}
