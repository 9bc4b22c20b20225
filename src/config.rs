use anyhow::{Context, Result};
use postline_core::retry::{RetryPolicy, DEFAULT_BACKOFF_SECS};
use postline_core::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_inter_post_delay_ms")]
    pub inter_post_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            inter_post_delay_ms: default_inter_post_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.backoff_secs.clone())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn inter_post_delay(&self) -> Duration {
        Duration::from_millis(self.inter_post_delay_ms)
    }
}

fn default_backoff_secs() -> Vec<u64> {
    DEFAULT_BACKOFF_SECS.to_vec()
}
fn default_interval_secs() -> u64 {
    15
}
fn default_batch_size() -> i64 {
    10
}
fn default_inter_post_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublisherConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PublisherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
        }
    }
}

fn default_window_hours() -> i64 {
    24
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate pipeline
    let p = &config.pipeline;
    if !(0.0..=1.0).contains(&p.pre_weight) || !(0.0..=1.0).contains(&p.post_weight) {
        anyhow::bail!("pipeline.pre_weight and pipeline.post_weight must be in [0.0, 1.0]");
    }
    if ((p.pre_weight + p.post_weight) - 1.0).abs() > 1e-9 {
        anyhow::bail!(
            "pipeline.pre_weight + pipeline.post_weight must equal 1.0 (got {})",
            p.pre_weight + p.post_weight
        );
    }
    if p.acceptance_threshold > 100 {
        anyhow::bail!("pipeline.acceptance_threshold must be <= 100");
    }

    // Validate retry
    let r = &config.retry;
    if r.backoff_secs.is_empty() {
        anyhow::bail!("retry.backoff_secs must contain at least one delay");
    }
    if r.backoff_secs.contains(&0) {
        anyhow::bail!("retry.backoff_secs entries must be > 0");
    }
    if r.interval_secs == 0 {
        anyhow::bail!("retry.interval_secs must be > 0");
    }
    if r.batch_size < 1 {
        anyhow::bail!("retry.batch_size must be >= 1");
    }

    // Validate publisher
    if !config.publisher.endpoint.starts_with("http://")
        && !config.publisher.endpoint.starts_with("https://")
    {
        anyhow::bail!(
            "publisher.endpoint must be an http(s) URL, got '{}'",
            config.publisher.endpoint
        );
    }
    if config.publisher.timeout_secs == 0 || config.fetch.timeout_secs == 0 {
        anyhow::bail!("publisher.timeout_secs and fetch.timeout_secs must be > 0");
    }

    if config.health.window_hours < 1 {
        anyhow::bail!("health.window_hours must be >= 1");
    }

    Ok(())
}
