//! Shared collaborators for import, delivery, and the retry worker.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use postline_core::clock::{Clock, SystemClock};
use postline_core::publish::Publisher;
use postline_core::retry::RetryPolicy;
use postline_core::store::Store;
use postline_core::PipelineConfig;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::publisher::HttpPublisher;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub publisher: Arc<dyn Publisher>,
    pub clock: Arc<dyn Clock>,
    pub pipeline: PipelineConfig,
    pub retry: RetryPolicy,
    /// Upper bound on one publisher call.
    pub delivery_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl AppContext {
    /// Wire a SQLite store and HTTP publisher from configuration.
    ///
    /// Ensures the schema exists before returning.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate_pool(&pool).await?;

        Ok(Self {
            store: Arc::new(SqliteStore::new(pool)),
            publisher: Arc::new(HttpPublisher::from_config(&config.publisher)?),
            clock: Arc::new(SystemClock),
            pipeline: config.pipeline,
            retry: config.retry.policy(),
            delivery_timeout: config.publisher.timeout(),
            fetch_timeout: Duration::from_secs(config.fetch.timeout_secs),
        })
    }

    /// Context with default policies around the given collaborators.
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn Publisher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            publisher,
            clock,
            pipeline: PipelineConfig::default(),
            retry: RetryPolicy::default(),
            delivery_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}
