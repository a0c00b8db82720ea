//! Crawler module for request execution and job scheduling
//!
//! This module contains the core fetch logic, including:
//! - HTTP client construction
//! - Status-code classification
//! - The per-request retry state machine and its hooks
//! - Streaming downloads with progress tracking
//! - The bounded worker pool draining the task queue
//! - Content extraction helpers for success hooks

mod classifier;
mod client;
mod context;
mod download;
mod extract;
mod scheduler;

pub use classifier::{StatusCategory, StatusClassifier};
pub use client::{build_http_client, user_agent_string};
pub use context::{Hook, Hooks, RequestContext, DEFAULT_MAX_ATTEMPTS};
pub use download::{format_size, DownloadProgress, DOWNLOAD_CHUNK_SIZE};
pub use extract::{extract_links, extract_text, extract_title};
pub use scheduler::{
    start_job_get, JobReport, JobScheduler, DEFAULT_IDLE_BACKOFF, DEFAULT_WORKERS,
};

use crate::config::Config;
use crate::queue::TaskQueue;
use crate::GatherError;
use std::sync::Arc;
use std::time::Duration;

/// Builds a scheduler for `queue` from a loaded configuration
///
/// This wires the configured client, status table, cookie pool, and engine
/// limits; the caller supplies the hooks.
pub fn scheduler_from_config(
    config: &Config,
    queue: Arc<TaskQueue>,
    hooks: Hooks,
) -> Result<JobScheduler, GatherError> {
    let client = build_http_client(&config.engine, &config.user_agent)?;

    let mut scheduler = JobScheduler::new(queue, client, hooks)
        .workers(config.engine.workers)
        .max_attempts(config.engine.max_attempts)
        .classifier(config.classifier()?)
        .idle_backoff(Duration::from_millis(config.engine.idle_backoff_ms))
        .log_attempts(config.engine.log_attempts);

    let pool = config.cookie_pool();
    if !pool.is_empty() {
        scheduler = scheduler.cookie_pool(Arc::new(pool));
    }

    Ok(scheduler)
}
