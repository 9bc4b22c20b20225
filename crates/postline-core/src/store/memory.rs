//! In-memory [`Store`] implementation for testing.
//!
//! Keeps clients, operations, and posts in insertion-ordered `Vec`s behind a
//! single `std::sync::RwLock`. Lookups are linear scans.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Client, HealthSummary, NewPost, Operation, OperationCounts, OperationKind, OperationStatus,
    Post, PostStatus, QueueCounts,
};

use super::{summarize_health, Store};

#[derive(Default)]
struct Inner {
    clients: Vec<Client>,
    operations: Vec<Operation>,
    posts: Vec<Post>,
}

/// In-memory store for tests and previews.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Inner {
    fn operation_mut(&mut self, id: &str) -> Result<&mut Operation> {
        self.operations
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| anyhow!("operation not found: {}", id))
    }

    fn post_mut(&mut self, id: &str) -> Result<&mut Post> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("post not found: {}", id))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_client(&self, name: &str, credential: &str) -> Result<Client> {
        let client = Client {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            credential: credential.to_string(),
            created_at: Utc::now(),
        };
        self.write()?.clients.push(client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        Ok(self.read()?.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        Ok(self.read()?.clients.clone())
    }

    async fn create_operation(
        &self,
        client_ref: &str,
        kind: OperationKind,
        source_ref: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.write()?.operations.push(Operation {
            id: id.clone(),
            client_ref: client_ref.to_string(),
            kind,
            source_ref: source_ref.to_string(),
            total_posts: 0,
            success_count: 0,
            fail_count: 0,
            corrected_count: 0,
            rejected_count: 0,
            status: OperationStatus::Processing,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn update_operation_total(&self, id: &str, total: i64) -> Result<()> {
        self.write()?.operation_mut(id)?.total_posts = total;
        Ok(())
    }

    async fn complete_operation(
        &self,
        id: &str,
        counts: &OperationCounts,
    ) -> Result<OperationStatus> {
        let mut inner = self.write()?;
        let op = inner.operation_mut(id)?;
        let status = OperationStatus::from_counts(counts);
        op.success_count = counts.successful;
        op.fail_count = counts.failed;
        op.corrected_count = counts.corrected;
        op.rejected_count = counts.rejected;
        op.status = status;
        op.completed_at = Some(Utc::now());
        Ok(status)
    }

    async fn fail_operation(&self, id: &str, message: &str) -> Result<()> {
        let mut inner = self.write()?;
        let op = inner.operation_mut(id)?;
        op.status = OperationStatus::Failed;
        op.error_message = Some(message.to_string());
        op.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_operation(&self, id: &str) -> Result<Option<Operation>> {
        Ok(self.read()?.operations.iter().find(|o| o.id == id).cloned())
    }

    async fn list_operations(&self, limit: i64) -> Result<Vec<Operation>> {
        let inner = self.read()?;
        Ok(inner
            .operations
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create_post(
        &self,
        operation_ref: &str,
        client_ref: &str,
        post: &NewPost,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.write()?.posts.push(Post {
            id: id.clone(),
            operation_ref: operation_ref.to_string(),
            client_ref: client_ref.to_string(),
            original_content: post.original_content.clone(),
            processed_content: post.processed_content.clone(),
            quality_score: post.quality_score,
            issues: post.issues.clone(),
            corrections: post.corrections.clone(),
            status: post.status,
            external_response: None,
            retry_count: 0,
            next_retry_at: None,
            scheduled_for: post.scheduled_for,
            created_at: Utc::now(),
            sent_at: None,
        });
        Ok(id)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.read()?.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn list_posts(&self, operation_ref: &str) -> Result<Vec<Post>> {
        Ok(self
            .read()?
            .posts
            .iter()
            .filter(|p| p.operation_ref == operation_ref)
            .cloned()
            .collect())
    }

    async fn mark_post_sent(&self, id: &str, response: &str) -> Result<()> {
        let mut inner = self.write()?;
        let post = inner.post_mut(id)?;
        post.status = PostStatus::Sent;
        post.external_response = Some(response.to_string());
        post.next_retry_at = None;
        post.sent_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_post_failed(
        &self,
        id: &str,
        message: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let post = inner.post_mut(id)?;
        post.status = PostStatus::Failed;
        post.external_response = Some(message.to_string());
        post.retry_count += 1;
        post.next_retry_at = Some(next_retry_at);
        Ok(())
    }

    async fn mark_post_permanently_failed(&self, id: &str, message: &str) -> Result<()> {
        let mut inner = self.write()?;
        let post = inner.post_mut(id)?;
        post.status = PostStatus::PermanentlyFailed;
        post.external_response = Some(message.to_string());
        post.next_retry_at = None;
        Ok(())
    }

    async fn posts_due_for_retry(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Post>> {
        let inner = self.read()?;
        let mut due: Vec<Post> = inner
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Failed)
            .filter(|p| p.next_retry_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.next_retry_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn queue_counts(&self) -> Result<QueueCounts> {
        let mut counts = QueueCounts::default();
        for post in &self.read()?.posts {
            counts.add(post.status, 1);
        }
        Ok(counts)
    }

    async fn health_summary(&self, since: DateTime<Utc>) -> Result<HealthSummary> {
        let inner = self.read()?;
        Ok(summarize_health(
            inner
                .posts
                .iter()
                .filter(|p| p.created_at >= since)
                .map(|p| (p.status, p.quality_score, !p.corrections.is_empty())),
        ))
    }
}
