//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `clients`, `operations`, and `posts`
//! tables created by [`migrate`](crate::migrate). Timestamps are stored as
//! Unix seconds; issues and corrections as JSON text.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use postline_core::models::{
    Client, HealthSummary, NewPost, Operation, OperationCounts, OperationKind, OperationStatus,
    Post, PostStatus, QueueCounts,
};
use postline_core::store::{summarize_health, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Whole seconds, rounded up, so a stored deadline is never earlier than asked.
fn to_ts_ceil(t: DateTime<Utc>) -> i64 {
    t.timestamp() + i64::from(t.timestamp_subsec_nanos() > 0)
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("timestamp out of range: {}", ts))
}

fn from_opt_ts(ts: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    ts.map(from_ts).transpose()
}

fn row_to_client(row: &SqliteRow) -> Result<Client> {
    Ok(Client {
        id: row.get("id"),
        name: row.get("name"),
        credential: row.get("credential"),
        created_at: from_ts(row.get("created_at"))?,
    })
}

fn row_to_operation(row: &SqliteRow) -> Result<Operation> {
    Ok(Operation {
        id: row.get("id"),
        client_ref: row.get("client_ref"),
        kind: row.get::<String, _>("kind").parse()?,
        source_ref: row.get("source_ref"),
        total_posts: row.get("total_posts"),
        success_count: row.get("success_count"),
        fail_count: row.get("fail_count"),
        corrected_count: row.get("corrected_count"),
        rejected_count: row.get("rejected_count"),
        status: row.get::<String, _>("status").parse()?,
        error_message: row.get("error_message"),
        started_at: from_ts(row.get("started_at"))?,
        completed_at: from_opt_ts(row.get("completed_at"))?,
    })
}

fn row_to_post(row: &SqliteRow) -> Result<Post> {
    let issues_json: String = row.get("issues_json");
    let corrections_json: String = row.get("corrections_json");
    Ok(Post {
        id: row.get("id"),
        operation_ref: row.get("operation_ref"),
        client_ref: row.get("client_ref"),
        original_content: row.get("original_content"),
        processed_content: row.get("processed_content"),
        quality_score: row.get::<i64, _>("quality_score") as u32,
        issues: serde_json::from_str(&issues_json).context("invalid issues_json")?,
        corrections: serde_json::from_str(&corrections_json)
            .context("invalid corrections_json")?,
        status: row.get::<String, _>("status").parse()?,
        external_response: row.get("external_response"),
        retry_count: row.get::<i64, _>("retry_count") as u32,
        next_retry_at: from_opt_ts(row.get("next_retry_at"))?,
        scheduled_for: from_opt_ts(row.get("scheduled_for"))?,
        created_at: from_ts(row.get("created_at"))?,
        sent_at: from_opt_ts(row.get("sent_at"))?,
    })
}

const POST_COLUMNS: &str = "id, operation_ref, client_ref, original_content, processed_content, \
     quality_score, issues_json, corrections_json, status, external_response, retry_count, \
     next_retry_at, scheduled_for, created_at, sent_at";

#[async_trait]
impl Store for SqliteStore {
    async fn create_client(&self, name: &str, credential: &str) -> Result<Client> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query("INSERT INTO clients (id, name, credential, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(credential)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(Client {
            id,
            name: name.to_string(),
            credential: credential.to_string(),
            created_at: from_ts(now)?,
        })
    }

    async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT id, name, credential, created_at FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_client).transpose()
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            "SELECT id, name, credential, created_at FROM clients ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_client).collect()
    }

    async fn create_operation(
        &self,
        client_ref: &str,
        kind: OperationKind,
        source_ref: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO operations (id, client_ref, kind, source_ref, total_posts, status, started_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(client_ref)
        .bind(kind.as_str())
        .bind(source_ref)
        .bind(OperationStatus::Processing.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_operation_total(&self, id: &str, total: i64) -> Result<()> {
        let result = sqlx::query("UPDATE operations SET total_posts = ? WHERE id = ?")
            .bind(total)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("operation not found: {}", id);
        }
        Ok(())
    }

    async fn complete_operation(
        &self,
        id: &str,
        counts: &OperationCounts,
    ) -> Result<OperationStatus> {
        let status = OperationStatus::from_counts(counts);

        let result = sqlx::query(
            r#"
            UPDATE operations
            SET success_count = ?, fail_count = ?, corrected_count = ?, rejected_count = ?,
                status = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(counts.successful)
        .bind(counts.failed)
        .bind(counts.corrected)
        .bind(counts.rejected)
        .bind(status.as_str())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("operation not found: {}", id);
        }

        Ok(status)
    }

    async fn fail_operation(&self, id: &str, message: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE operations SET status = ?, error_message = ?, completed_at = ? WHERE id = ?",
        )
        .bind(OperationStatus::Failed.as_str())
        .bind(message)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("operation not found: {}", id);
        }
        Ok(())
    }

    async fn get_operation(&self, id: &str) -> Result<Option<Operation>> {
        let row = sqlx::query("SELECT * FROM operations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_operation).transpose()
    }

    async fn list_operations(&self, limit: i64) -> Result<Vec<Operation>> {
        let rows =
            sqlx::query("SELECT * FROM operations ORDER BY started_at DESC, rowid DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_operation).collect()
    }

    async fn create_post(
        &self,
        operation_ref: &str,
        client_ref: &str,
        post: &NewPost,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let issues_json = serde_json::to_string(&post.issues)?;
        let corrections_json = serde_json::to_string(&post.corrections)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, operation_ref, client_ref, seq, original_content,
                               processed_content, quality_score, issues_json, corrections_json,
                               status, retry_count, scheduled_for, created_at)
            VALUES (?, ?, ?,
                    (SELECT COALESCE(MAX(seq), -1) + 1 FROM posts WHERE operation_ref = ?),
                    ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(operation_ref)
        .bind(client_ref)
        .bind(operation_ref)
        .bind(&post.original_content)
        .bind(&post.processed_content)
        .bind(i64::from(post.quality_score))
        .bind(&issues_json)
        .bind(&corrections_json)
        .bind(post.status.as_str())
        .bind(post.scheduled_for.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn list_posts(&self, operation_ref: &str) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE operation_ref = ? ORDER BY seq",
            POST_COLUMNS
        ))
        .bind(operation_ref)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_post).collect()
    }

    async fn mark_post_sent(&self, id: &str, response: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = ?, external_response = ?, next_retry_at = NULL, sent_at = ?
            WHERE id = ?
            "#,
        )
        .bind(PostStatus::Sent.as_str())
        .bind(response)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("post not found: {}", id);
        }
        Ok(())
    }

    async fn mark_post_failed(
        &self,
        id: &str,
        message: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = ?, external_response = ?, retry_count = retry_count + 1,
                next_retry_at = ?
            WHERE id = ?
            "#,
        )
        .bind(PostStatus::Failed.as_str())
        .bind(message)
        .bind(to_ts_ceil(next_retry_at))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("post not found: {}", id);
        }
        Ok(())
    }

    async fn mark_post_permanently_failed(&self, id: &str, message: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE posts SET status = ?, external_response = ?, next_retry_at = NULL WHERE id = ?",
        )
        .bind(PostStatus::PermanentlyFailed.as_str())
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("post not found: {}", id);
        }
        Ok(())
    }

    async fn posts_due_for_retry(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM posts
            WHERE status = ? AND next_retry_at IS NOT NULL AND next_retry_at <= ?
            ORDER BY next_retry_at ASC, rowid ASC
            LIMIT ?
            "#,
            POST_COLUMNS
        ))
        .bind(PostStatus::Failed.as_str())
        .bind(now.timestamp())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_post).collect()
    }

    async fn queue_counts(&self) -> Result<QueueCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM posts GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = QueueCounts::default();
        for row in &rows {
            let status: PostStatus = row.get::<String, _>("status").parse()?;
            counts.add(status, row.get("n"));
        }
        Ok(counts)
    }

    async fn health_summary(&self, since: DateTime<Utc>) -> Result<HealthSummary> {
        let rows = sqlx::query(
            "SELECT status, quality_score, corrections_json FROM posts WHERE created_at >= ?",
        )
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;

        let mut parsed = Vec::with_capacity(rows.len());
        for row in &rows {
            let status: PostStatus = row.get::<String, _>("status").parse()?;
            let score = row.get::<i64, _>("quality_score") as u32;
            let corrections: Vec<String> =
                serde_json::from_str(&row.get::<String, _>("corrections_json"))?;
            parsed.push((status, score, !corrections.is_empty()));
        }
        Ok(summarize_health(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::migrate_pool;
    use chrono::Duration;
    use postline_core::models::{QualityIssue, Severity};
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("data/postline.sqlite"))
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        // Migrations are idempotent.
        migrate_pool(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    fn new_post(text: &str, status: PostStatus) -> NewPost {
        NewPost {
            original_content: format!("Day 1:\n{}", text),
            processed_content: text.to_string(),
            quality_score: 99,
            issues: vec![QualityIssue {
                code: "DAY_HEADER".to_string(),
                severity: Severity::Warning,
                description: "Day header present".to_string(),
                auto_fixable: true,
                position: Some(0),
            }],
            corrections: vec!["Removed Day header".to_string()],
            status,
            scheduled_for: None,
        }
    }

    #[tokio::test]
    async fn test_clients_round_trip() {
        let (_tmp, store) = test_store().await;
        let client = store.create_client("Acme", "secret-token").await.unwrap();

        let loaded = store.get_client(&client.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Acme");
        assert_eq!(loaded.credential, "secret-token");
        assert!(store.get_client("missing").await.unwrap().is_none());
        assert_eq!(store.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_posts_keep_chunk_order_and_json_fields() {
        let (_tmp, store) = test_store().await;
        let op = store
            .create_operation("client-1", OperationKind::File, "notes.md")
            .await
            .unwrap();

        for text in ["first post text", "second post text", "third post text"] {
            store
                .create_post(&op, "client-1", &new_post(text, PostStatus::Queued))
                .await
                .unwrap();
        }

        let posts = store.list_posts(&op).await.unwrap();
        let texts: Vec<&str> = posts.iter().map(|p| p.processed_content.as_str()).collect();
        assert_eq!(
            texts,
            vec!["first post text", "second post text", "third post text"]
        );
        assert_eq!(posts[0].issues[0].code, "DAY_HEADER");
        assert_eq!(posts[0].issues[0].position, Some(0));
        assert_eq!(posts[0].corrections, vec!["Removed Day header"]);
        assert_eq!(posts[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_operation_completion_and_failure() {
        let (_tmp, store) = test_store().await;
        let op = store
            .create_operation("client-1", OperationKind::Text, "inline")
            .await
            .unwrap();
        store.update_operation_total(&op, 2).await.unwrap();

        let status = store
            .complete_operation(
                &op,
                &OperationCounts {
                    successful: 1,
                    failed: 1,
                    corrected: 1,
                    rejected: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(status, OperationStatus::Partial);

        let loaded = store.get_operation(&op).await.unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Partial);
        assert_eq!(loaded.kind, OperationKind::Text);
        assert_eq!(loaded.total_posts, 2);
        assert!(loaded.completed_at.is_some());

        let failed = store
            .create_operation("client-1", OperationKind::Url, "https://example.com/doc")
            .await
            .unwrap();
        store
            .fail_operation(&failed, "Document produced no post chunks")
            .await
            .unwrap();
        let loaded = store.get_operation(&failed).await.unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Failed);
        assert_eq!(
            loaded.error_message.as_deref(),
            Some("Document produced no post chunks")
        );

        assert_eq!(store.list_operations(10).await.unwrap().len(), 2);
        assert!(store.fail_operation("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_retry_lifecycle_and_due_query() {
        let (_tmp, store) = test_store().await;
        let op = store
            .create_operation("client-1", OperationKind::Text, "inline")
            .await
            .unwrap();
        let id = store
            .create_post(&op, "client-1", &new_post("a post", PostStatus::Queued))
            .await
            .unwrap();
        let now = Utc::now();

        store
            .mark_post_failed(&id, "HTTP 503: unavailable", now + Duration::seconds(30))
            .await
            .unwrap();
        assert!(store.posts_due_for_retry(now, 10).await.unwrap().is_empty());

        let due = store
            .posts_due_for_retry(now + Duration::seconds(31), 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].retry_count, 1);
        assert_eq!(due[0].status, PostStatus::Failed);

        store.mark_post_permanently_failed(&id, "gave up").await.unwrap();
        let post = store.get_post(&id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::PermanentlyFailed);
        assert!(post.next_retry_at.is_none());
        assert!(store
            .posts_due_for_retry(now + Duration::days(1), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_fractional_deadline_is_never_due_early() {
        let (_tmp, store) = test_store().await;
        let op = store
            .create_operation("client-1", OperationKind::Text, "inline")
            .await
            .unwrap();
        let id = store
            .create_post(&op, "client-1", &new_post("a post", PostStatus::Queued))
            .await
            .unwrap();

        let second = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let deadline = second + Duration::milliseconds(400);
        store
            .mark_post_failed(&id, "timeout", deadline)
            .await
            .unwrap();

        // Same whole second as the deadline but before it.
        assert!(store
            .posts_due_for_retry(second + Duration::milliseconds(200), 10)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .posts_due_for_retry(second + Duration::seconds(1), 10)
                .await
                .unwrap()
                .len(),
            1
        );

        let post = store.get_post(&id).await.unwrap().unwrap();
        assert!(post.next_retry_at.unwrap() >= deadline);
    }

    #[tokio::test]
    async fn test_counts_and_health() {
        let (_tmp, store) = test_store().await;
        let op = store
            .create_operation("client-1", OperationKind::Text, "inline")
            .await
            .unwrap();
        let sent = store
            .create_post(&op, "client-1", &new_post("sent post", PostStatus::Queued))
            .await
            .unwrap();
        store.mark_post_sent(&sent, "{\"id\":1}").await.unwrap();
        let mut rejected = new_post("rejected", PostStatus::Rejected);
        rejected.quality_score = 0;
        rejected.corrections.clear();
        store.create_post(&op, "client-1", &rejected).await.unwrap();

        let counts = store.queue_counts().await.unwrap();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.rejected, 1);
        assert_eq!(counts.failed, 0);

        let health = store
            .health_summary(Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(health.total_posts, 2);
        assert_eq!(health.sent, 1);
        assert_eq!(health.corrected, 1);
        assert_eq!(health.rejected, 1);
        assert!((health.success_rate - 0.5).abs() < 1e-9);
    }
}
