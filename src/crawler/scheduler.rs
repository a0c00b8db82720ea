//! Job scheduler driving a bounded worker pool against the task queue
//!
//! This module handles:
//! - Spawning a fixed number of workers that pull tasks from a shared queue
//! - Building a request context per task (hooks, classifier, random cookie)
//! - Tracking in-flight work so the run only ends once the queue is durably empty
//!
//! # Termination
//!
//! A worker announces itself in flight *before* popping, and leaves only after
//! the task's request cycle (and every hook it fires) has returned. A failure
//! hook that re-enqueues its task therefore does so while the counter is still
//! non-zero, and no sibling can observe "queue empty and nothing in flight" in
//! between. A worker exits after seeing that idle condition on two consecutive
//! polls separated by the idle backoff.

use crate::crawler::{Hooks, RequestContext, StatusClassifier, DEFAULT_MAX_ATTEMPTS};
use crate::queue::{Task, TaskQueue};
use crate::state::{CookiePool, Outcome};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// Default wait between queue polls for an idle worker
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome counts for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub succeeded: usize,
    pub failed: usize,
    pub exhausted: usize,
    pub stopped: usize,
    /// Tasks whose URL could not be turned into a request
    pub malformed: usize,
}

impl JobReport {
    /// Total number of tasks processed, requeued passes included
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.exhausted + self.stopped + self.malformed
    }
}

#[derive(Debug, Default)]
struct JobStats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    exhausted: AtomicUsize,
    stopped: AtomicUsize,
    malformed: AtomicUsize,
}

impl JobStats {
    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Succeeded => &self.succeeded,
            Outcome::Failed => &self.failed,
            Outcome::RetryBudgetExceeded => &self.exhausted,
            Outcome::Stopped { .. } => &self.stopped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> JobReport {
        JobReport {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            stopped: self.stopped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Marks one worker as in flight until dropped, including during a panic unwind
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State shared by every worker of one run
struct Shared {
    queue: Arc<TaskQueue>,
    client: Client,
    hooks: Hooks,
    classifier: Arc<StatusClassifier>,
    cookies: Option<Arc<CookiePool>>,
    max_attempts: u32,
    idle_backoff: Duration,
    log_attempts: bool,
    in_flight: AtomicUsize,
    stats: JobStats,
}

impl Shared {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    async fn process(&self, job_number: usize, task: Task) {
        let url = task.url().to_string();
        let mut ctx = match RequestContext::for_task(self.client.clone(), task) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(%url, job = job_number, error = %e, "Skipping malformed task");
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        ctx = ctx
            .with_hooks(self.hooks.clone())
            .with_classifier(Arc::clone(&self.classifier))
            .with_max_attempts(self.max_attempts)
            .with_job_number(job_number)
            .with_logging(self.log_attempts);

        if let Some(pool) = &self.cookies {
            match pool.get_random() {
                Ok(cookie) => {
                    if let Err(e) = ctx.add_cookie(&cookie) {
                        tracing::debug!(%url, error = %e, "Pooled cookie rejected");
                    }
                }
                Err(e) => tracing::debug!(%url, error = %e, "No cookie attached"),
            }
        }

        let outcome = ctx.execute().await;
        tracing::debug!(%url, job = job_number, %outcome, attempts = ctx.attempts(), "Task finished");
        self.stats.record(outcome);
    }

    async fn worker_loop(self: Arc<Self>, job_number: usize) {
        tracing::debug!(job = job_number, "Worker started");
        let mut idle_polls = 0;

        loop {
            let ticket = InFlight::enter(&self.in_flight);
            match self.queue.pop() {
                Some(task) => {
                    idle_polls = 0;
                    self.process(job_number, task).await;
                    drop(ticket);
                }
                None => {
                    drop(ticket);
                    if self.is_idle() {
                        idle_polls += 1;
                        if idle_polls >= 2 {
                            break;
                        }
                    } else {
                        idle_polls = 0;
                    }
                    tokio::time::sleep(self.idle_backoff).await;
                }
            }
        }

        tracing::debug!(job = job_number, "Worker stopped");
    }
}

/// Bounded worker pool that drains a [`TaskQueue`]
///
/// # Example
///
/// ```no_run
/// use gatherer::crawler::{Hooks, JobScheduler};
/// use gatherer::queue::{Task, TaskQueue};
///
/// # async fn run() {
/// let queue = TaskQueue::new();
/// queue.add(Task::new("https://example.com/1.0.1.0"));
///
/// let hooks = Hooks::new()
///     .on_succeed(|ctx| println!("{} bytes", ctx.resp_body().len()))
///     .on_fail(|ctx| {
///         let _ = ctx.requeue_task();
///     });
///
/// let report = JobScheduler::new(queue, reqwest::Client::new(), hooks)
///     .workers(4)
///     .run()
///     .await;
/// println!("{:?}", report);
/// # }
/// ```
pub struct JobScheduler {
    queue: Arc<TaskQueue>,
    client: Client,
    hooks: Hooks,
    classifier: Arc<StatusClassifier>,
    cookies: Option<Arc<CookiePool>>,
    workers: usize,
    max_attempts: u32,
    idle_backoff: Duration,
    log_attempts: bool,
}

impl JobScheduler {
    /// Creates a scheduler with default limits
    pub fn new(queue: Arc<TaskQueue>, client: Client, hooks: Hooks) -> Self {
        Self {
            queue,
            client,
            hooks,
            classifier: Arc::new(StatusClassifier::default()),
            cookies: None,
            workers: DEFAULT_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            log_attempts: true,
        }
    }

    /// Sets the worker count; values below 1 are raised to 1
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn classifier(mut self, classifier: StatusClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Attaches a random cookie from this pool to every request
    pub fn cookie_pool(mut self, pool: Arc<CookiePool>) -> Self {
        self.cookies = Some(pool);
        self
    }

    /// Sets the wait between polls of an empty queue; zero is raised to 1ms
    pub fn idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff.max(Duration::from_millis(1));
        self
    }

    pub fn log_attempts(mut self, enabled: bool) -> Self {
        self.log_attempts = enabled;
        self
    }

    /// Runs every worker to completion
    ///
    /// Returns once the queue is empty and no worker is processing a task.
    /// A worker that panics is logged and does not stop its siblings.
    pub async fn run(self) -> JobReport {
        let worker_count = self.workers;
        let shared = Arc::new(Shared {
            queue: self.queue,
            client: self.client,
            hooks: self.hooks,
            classifier: self.classifier,
            cookies: self.cookies,
            max_attempts: self.max_attempts,
            idle_backoff: self.idle_backoff,
            log_attempts: self.log_attempts,
            in_flight: AtomicUsize::new(0),
            stats: JobStats::default(),
        });

        tracing::info!(
            workers = worker_count,
            queued = shared.queue.len(),
            "Starting job run"
        );
        let started = Instant::now();

        let mut workers = JoinSet::new();
        for job_number in 1..=worker_count {
            workers.spawn(Arc::clone(&shared).worker_loop(job_number));
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker terminated abnormally");
            }
        }

        let report = shared.stats.snapshot();
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            exhausted = report.exhausted,
            stopped = report.stopped,
            malformed = report.malformed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job run complete"
        );
        report
    }
}

/// Runs `workers` workers over `queue` with the given hooks and default limits
pub async fn start_job_get(
    workers: usize,
    queue: Arc<TaskQueue>,
    client: Client,
    hooks: Hooks,
) -> JobReport {
    JobScheduler::new(queue, client, hooks)
        .workers(workers)
        .run()
        .await
}
