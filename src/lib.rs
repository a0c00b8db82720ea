//! Gatherer: a concurrent HTTP fetch engine for batch crawling
//!
//! This crate executes HTTP requests through a status-code driven retry state
//! machine and schedules many of them concurrently from a shared task queue
//! with a bounded worker pool.

pub mod config;
pub mod crawler;
pub mod queue;
pub mod state;

use thiserror::Error;

/// Main error type for Gatherer operations
#[derive(Debug, Error)]
pub enum GatherError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("{pool} pool is empty")]
    EmptyPool { pool: &'static str },

    #[error("No task is bound to this request")]
    NoTask,

    #[error("The queue owning this task has been dropped")]
    QueueDropped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while running a single request through its retry cycle
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Retry budget of {max_attempts} attempts exceeded for {url}")]
    RetryBudgetExceeded { url: String, max_attempts: u32 },

    #[error("Failed to read body of {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("HTTP {status} classified as failure for {url}")]
    FailureStatus { url: String, status: u16 },

    #[error("Failed to write download of {url}: {source}")]
    Sink { url: String, source: std::io::Error },
}

impl FetchError {
    /// Returns true if the error leads to another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Gatherer operations
pub type Result<T> = std::result::Result<T, GatherError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    build_http_client, start_job_get, Hooks, JobReport, JobScheduler, RequestContext,
    StatusCategory, StatusClassifier,
};
pub use queue::{Task, TaskQueue};
pub use state::{Cookie, CookiePool, Outcome};
