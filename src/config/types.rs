use crate::config::validation::parse_status_key;
use crate::crawler::{StatusCategory, StatusClassifier};
use crate::queue::{Task, TaskQueue};
use crate::state::{Cookie, CookiePool};
use crate::ConfigError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Main configuration structure for Gatherer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    /// Overrides and additions to the default status-code table
    #[serde(rename = "status-codes", default)]
    pub status_codes: HashMap<String, StatusCategory>,
    #[serde(rename = "cookie", default)]
    pub cookies: Vec<CookieEntry>,
    #[serde(rename = "seed", default)]
    pub seeds: Vec<SeedEntry>,
    #[serde(default)]
    pub extract: ExtractConfig,
}

impl Config {
    /// Builds the status classifier: the default table with `[status-codes]` applied on top
    pub fn classifier(&self) -> Result<StatusClassifier, ConfigError> {
        let mut classifier = StatusClassifier::default();
        for (key, category) in &self.status_codes {
            classifier.insert(parse_status_key(key)?, *category);
        }
        Ok(classifier)
    }

    /// Builds the cookie pool from `[[cookie]]` entries
    pub fn cookie_pool(&self) -> CookiePool {
        self.cookies
            .iter()
            .map(|c| Cookie::new(c.name.clone(), c.value.clone()))
            .collect()
    }

    /// Adds a task for every `[[seed]]` entry to the queue, in file order
    pub fn seed_queue(&self, queue: &Arc<TaskQueue>) {
        for seed in &self.seeds {
            let mut task = Task::new(seed.url.clone());
            task.metadata = seed.metadata.clone();
            queue.add(task);
        }
    }
}

/// Fetch engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Maximum number of attempts per request
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Whole-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// TCP/TLS connect timeout (milliseconds); at most the request timeout
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// How long an idle worker waits before polling the queue again (milliseconds)
    #[serde(rename = "idle-backoff-ms")]
    pub idle_backoff_ms: u64,

    /// Delay before the next attempt after a retryable outcome (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// How many times a failed task is handed back to the queue
    #[serde(rename = "requeue-failed")]
    pub requeue_failed: u32,

    /// Whether each attempt's outcome is logged
    #[serde(rename = "log-attempts")]
    pub log_attempts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            max_attempts: 3,
            request_timeout_ms: 5000,
            connect_timeout_ms: 3000,
            idle_backoff_ms: 50,
            retry_backoff_ms: 1000,
            requeue_failed: 0,
            log_attempts: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

/// Cookie seeded into the shared cookie pool
#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

/// Seed task added to the queue before the run starts
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub url: String,

    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Content extraction performed by the CLI's success hook
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// CSS selector whose text is logged for each fetched page
    pub selector: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            selector: "title".to_string(),
        }
    }
}
