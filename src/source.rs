//! Document acquisition.
//!
//! A [`DocumentSource`] names where an import's raw text comes from: a local
//! file, a remote URL, or text supplied inline. [`DocumentSource::acquire`]
//! returns the text; it performs no validation of the content itself.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use postline_core::models::OperationKind;

/// Where an import's document comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DocumentSource {
    File(PathBuf),
    Url(String),
    Text(String),
}

impl DocumentSource {
    pub fn kind(&self) -> OperationKind {
        match self {
            DocumentSource::File(_) => OperationKind::File,
            DocumentSource::Url(_) => OperationKind::Url,
            DocumentSource::Text(_) => OperationKind::Text,
        }
    }

    /// Identifier recorded on the operation: the path, the URL, or `inline`.
    pub fn source_ref(&self) -> String {
        match self {
            DocumentSource::File(path) => path.display().to_string(),
            DocumentSource::Url(url) => url.clone(),
            DocumentSource::Text(_) => "inline".to_string(),
        }
    }

    /// Fetch the raw document text.
    ///
    /// URL fetches honor `timeout` and treat any non-2xx response as an error.
    pub async fn acquire(&self, timeout: Duration) -> Result<String> {
        match self {
            DocumentSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read document: {}", path.display())),
            DocumentSource::Url(url) => fetch_url(url, timeout).await,
            DocumentSource::Text(text) => Ok(text.clone()),
        }
    }
}

async fn fetch_url(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch document: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Document fetch failed with HTTP {}: {}", status, body_text);
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_source_ref() {
        let file = DocumentSource::File(PathBuf::from("/tmp/week-12.md"));
        assert_eq!(file.kind(), OperationKind::File);
        assert_eq!(file.source_ref(), "/tmp/week-12.md");

        let url = DocumentSource::Url("https://example.com/doc.txt".to_string());
        assert_eq!(url.kind(), OperationKind::Url);
        assert_eq!(url.source_ref(), "https://example.com/doc.txt");

        let text = DocumentSource::Text("hello".to_string());
        assert_eq!(text.kind(), OperationKind::Text);
        assert_eq!(text.source_ref(), "inline");
    }

    #[test]
    fn test_deserializes_tagged_json() {
        let source: DocumentSource =
            serde_json::from_str(r#"{"kind":"text","value":"Some document"}"#).unwrap();
        assert!(matches!(source, DocumentSource::Text(t) if t == "Some document"));
    }

    #[tokio::test]
    async fn test_acquire_file_and_text() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        std::fs::write(&path, "Post one\n—\nPost two").unwrap();

        let text = DocumentSource::File(path)
            .acquire(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "Post one\n—\nPost two");

        let inline = DocumentSource::Text("inline body".to_string())
            .acquire(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(inline, "inline body");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = DocumentSource::File(PathBuf::from("/nonexistent/postline/doc.md"))
            .acquire(Duration::from_secs(1))
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read document"));
    }
}
