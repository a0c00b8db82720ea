//! Request context and its retry state machine
//!
//! A [`RequestContext`] owns one outbound request, the bookkeeping for its
//! attempts, and the caller hooks fired along the way:
//!
//! ```text
//! Init -> Attempting -> Succeeded
//!             ^   |---> Failed
//!             |   '---> Retrying --.
//!             '--------------------'
//! ```
//!
//! # Attempt rules
//!
//! | Condition | Action |
//! |-----------|--------|
//! | First attempt | `on_start` before any I/O |
//! | Last allowed attempt | `on_end` before dispatch |
//! | Budget used up | stop with `RetryBudgetExceeded`, no hook |
//! | Timeout | `on_retry`, attempt again |
//! | Other transport error | `on_fail`, stop |
//! | Status `success` | read body, `on_succeed`, stop |
//! | Status `retry` | `on_retry`, attempt again |
//! | Status `fail` | `on_fail`, stop |
//! | Status `start`/`end`/unclassified | log, stop |

use crate::crawler::download::DownloadProgress;
use crate::crawler::{StatusCategory, StatusClassifier};
use crate::queue::Task;
use crate::state::{Cookie, Outcome};
use crate::{FetchError, GatherError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::{Client, Method, Response, StatusCode};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Default number of attempts per request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A lifecycle callback; receives the context and may mutate it
pub type Hook = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// Caller-supplied lifecycle callbacks
///
/// Every hook is optional. Hooks are cheap to clone, so one set can be shared
/// by every context a scheduler builds.
#[derive(Clone, Default)]
pub struct Hooks {
    on_start: Option<Hook>,
    on_succeed: Option<Hook>,
    on_fail: Option<Hook>,
    on_retry: Option<Hook>,
    on_end: Option<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs once, before the first attempt
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(hook));
        self
    }

    /// Runs after a success response body has been read
    pub fn on_succeed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.on_succeed = Some(Arc::new(hook));
        self
    }

    /// Runs on a terminal failure
    pub fn on_fail<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.on_fail = Some(Arc::new(hook));
        self
    }

    /// Runs before each retry; may swap the client or set a retry delay
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Runs before the last allowed attempt
    pub fn on_end<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.on_end = Some(Arc::new(hook));
        self
    }

    fn get(&self, kind: HookKind) -> Option<Hook> {
        match kind {
            HookKind::Start => self.on_start.clone(),
            HookKind::Succeed => self.on_succeed.clone(),
            HookKind::Fail => self.on_fail.clone(),
            HookKind::Retry => self.on_retry.clone(),
            HookKind::End => self.on_end.clone(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_succeed", &self.on_succeed.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum HookKind {
    Start,
    Succeed,
    Fail,
    Retry,
    End,
}

/// One outbound request plus its retry bookkeeping and hooks
///
/// A context is owned by the worker that built it and is never shared.
#[derive(Debug)]
pub struct RequestContext {
    client: Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,

    status: Option<StatusCode>,
    response_headers: HeaderMap,
    response_cookies: Vec<Cookie>,
    resp_body: Vec<u8>,
    last_error: Option<FetchError>,

    attempts: u32,
    max_attempts: u32,
    retry_delay: Option<Duration>,
    latency: Duration,

    hooks: Hooks,
    classifier: Arc<StatusClassifier>,
    task: Option<Task>,
    job_number: usize,
    log_attempts: bool,
    progress: Option<DownloadProgress>,
}

impl RequestContext {
    /// Creates a context for the given method and URL
    pub fn new(client: Client, method: Method, url: Url) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            status: None,
            response_headers: HeaderMap::new(),
            response_cookies: Vec::new(),
            resp_body: Vec::new(),
            last_error: None,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: None,
            latency: Duration::ZERO,
            hooks: Hooks::default(),
            classifier: Arc::new(StatusClassifier::default()),
            task: None,
            job_number: 0,
            log_attempts: true,
            progress: None,
        }
    }

    /// Creates a GET context, parsing the URL
    pub fn get(client: Client, url: &str) -> Result<Self, GatherError> {
        Ok(Self::new(client, Method::GET, Url::parse(url)?))
    }

    /// Creates a GET context bound to a task
    ///
    /// Fails if the task's URL does not parse; the task is dropped with the error.
    pub fn for_task(client: Client, task: Task) -> Result<Self, GatherError> {
        let url = Url::parse(task.url())?;
        Ok(Self::new(client, Method::GET, url).with_task(task))
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<StatusClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_job_number(mut self, job_number: usize) -> Self {
        self.job_number = job_number;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Enables or disables per-attempt outcome logging
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_attempts = enabled;
        self
    }

    // ===== Accessors =====

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Status code of the most recent response, if the last attempt got one
    pub fn status(&self) -> Option<u16> {
        self.status.map(|s| s.as_u16())
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Cookies set by the most recent response
    pub fn response_cookies(&self) -> &[Cookie] {
        &self.response_cookies
    }

    /// Raw body of the success response
    pub fn resp_body(&self) -> &[u8] {
        &self.resp_body
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn resp_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.resp_body)
    }

    pub fn take_resp_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.resp_body)
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Wall-clock time of the most recent network call
    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn job_number(&self) -> usize {
        self.job_number
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn task_mut(&mut self) -> Option<&mut Task> {
        self.task.as_mut()
    }

    pub fn take_task(&mut self) -> Option<Task> {
        self.task.take()
    }

    /// Progress of the current or last streaming download
    pub fn progress(&self) -> Option<DownloadProgress> {
        self.progress
    }

    // ===== Mutators for hooks =====

    /// Replaces the client used by the following attempts (e.g. to switch proxy)
    pub fn set_client(&mut self, client: Client) {
        self.client = client;
    }

    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.max_attempts = max_attempts;
    }

    /// Waits this long before the next attempt; consumed by that attempt
    pub fn set_retry_delay(&mut self, delay: Duration) {
        self.retry_delay = Some(delay);
    }

    /// Appends a request header
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), GatherError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| GatherError::InvalidHeader {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| GatherError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.headers.append(header_name, header_value);
        Ok(())
    }

    /// Adds a cookie to the request's `Cookie` header
    pub fn add_cookie(&mut self, cookie: &Cookie) -> Result<(), GatherError> {
        let pair = cookie.to_string();
        let combined = match self.headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{}; {}", existing, pair),
            _ => pair,
        };
        let value = HeaderValue::from_str(&combined).map_err(|e| GatherError::InvalidHeader {
            name: COOKIE.to_string(),
            message: e.to_string(),
        })?;
        self.headers.insert(COOKIE, value);
        Ok(())
    }

    /// Copies the cookies set by the last response onto the outgoing request
    ///
    /// Returns how many cookies were carried over.
    pub fn carry_cookies(&mut self) -> Result<usize, GatherError> {
        let cookies = self.response_cookies.clone();
        for cookie in &cookies {
            self.add_cookie(cookie)?;
        }
        Ok(cookies.len())
    }

    /// Hands the bound task back to the queue it came from
    pub fn requeue_task(&mut self) -> Result<(), GatherError> {
        let task = self.task.take().ok_or(GatherError::NoTask)?;
        task.requeue()
    }

    // ===== Execution =====

    /// Runs the request through the retry state machine and buffers the body
    ///
    /// Expected terminal conditions are reported through hooks, logs, and the
    /// returned [`Outcome`]; this never returns an error.
    pub async fn execute(&mut self) -> Outcome {
        let response = match self.dispatch().await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        match response.bytes().await {
            Ok(bytes) => {
                self.resp_body = bytes.to_vec();
                self.succeed()
            }
            Err(source) => {
                let url = self.url.to_string();
                if self.log_attempts {
                    tracing::warn!(%url, error = %source, "Failed to read response body");
                }
                self.fail_with(FetchError::BodyRead { url, source })
            }
        }
    }

    /// Drives attempts until a response classified `success` arrives
    ///
    /// Returns the response whose body is still unread, or the terminal
    /// outcome if the cycle ended another way. Every other response is
    /// dropped before the next attempt so its connection is released.
    pub(crate) async fn dispatch(&mut self) -> Result<Response, Outcome> {
        loop {
            if self.attempts == 0 {
                self.fire(HookKind::Start);
            }

            if self.attempts.saturating_add(1) == self.max_attempts {
                self.fire(HookKind::End);
            }

            self.attempts = self.attempts.saturating_add(1);
            if self.attempts > self.max_attempts {
                if self.log_attempts {
                    tracing::warn!(
                        url = %self.url,
                        max_attempts = self.max_attempts,
                        job = self.job_number,
                        "Request failed more than {} times",
                        self.max_attempts
                    );
                }
                self.last_error = Some(FetchError::RetryBudgetExceeded {
                    url: self.url.to_string(),
                    max_attempts: self.max_attempts,
                });
                return Err(Outcome::RetryBudgetExceeded);
            }

            if let Some(delay) = self.retry_delay.take() {
                tokio::time::sleep(delay).await;
            }

            self.status = None;
            self.last_error = None;

            let request = match self.build_request() {
                Ok(request) => request,
                Err(source) => {
                    let url = self.url.to_string();
                    if self.log_attempts {
                        tracing::warn!(%url, error = %source, "Failed to build request");
                    }
                    return Err(self.fail_with(FetchError::Transport { url, source }));
                }
            };

            let started = Instant::now();
            let result = self.client.execute(request).await;
            self.latency = started.elapsed();

            let response = match result {
                Ok(response) => response,
                Err(source) => {
                    let url = self.url.to_string();
                    let error = if source.is_timeout() {
                        FetchError::Timeout { url }
                    } else {
                        FetchError::Transport { url, source }
                    };

                    if error.is_retryable() {
                        self.log_attempt(None, "retry");
                        self.last_error = Some(error);
                        self.fire(HookKind::Retry);
                        continue;
                    }

                    if self.log_attempts {
                        tracing::warn!(url = %self.url, attempt = self.attempts, %error, "Transport error");
                    }
                    return Err(self.fail_with(error));
                }
            };

            self.record_response(&response);
            let status = response.status();

            match self.classifier.classify(status.as_u16()) {
                Some(StatusCategory::Success) => {
                    self.log_attempt(Some(status), "success");
                    return Ok(response);
                }
                Some(StatusCategory::Retry) => {
                    drop(response);
                    self.log_attempt(Some(status), "retry");
                    self.fire(HookKind::Retry);
                }
                Some(StatusCategory::Fail) => {
                    drop(response);
                    self.log_attempt(Some(status), "fail");
                    let url = self.url.to_string();
                    return Err(self.fail_with(FetchError::FailureStatus {
                        url,
                        status: status.as_u16(),
                    }));
                }
                category => {
                    drop(response);
                    let label = category.map_or("unclassified", |c| c.as_str());
                    self.log_attempt(Some(status), label);
                    return Err(Outcome::Stopped {
                        status: status.as_u16(),
                    });
                }
            }
        }
    }

    /// Records a terminal failure and fires `on_fail`
    pub(crate) fn fail_with(&mut self, error: FetchError) -> Outcome {
        self.last_error = Some(error);
        self.fire(HookKind::Fail);
        Outcome::Failed
    }

    /// Fires `on_succeed`
    pub(crate) fn succeed(&mut self) -> Outcome {
        self.fire(HookKind::Succeed);
        Outcome::Succeeded
    }

    pub(crate) fn set_progress(&mut self, progress: DownloadProgress) {
        self.progress = Some(progress);
    }

    pub(crate) fn log_attempts(&self) -> bool {
        self.log_attempts
    }

    fn fire(&mut self, kind: HookKind) {
        if let Some(hook) = self.hooks.get(kind) {
            hook(self);
        }
    }

    fn build_request(&self) -> Result<reqwest::Request, reqwest::Error> {
        let mut builder = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder.build()
    }

    fn record_response(&mut self, response: &Response) {
        self.status = Some(response.status());
        self.response_headers = response.headers().clone();
        self.response_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(Cookie::parse_set_cookie)
            .collect();
    }

    fn log_attempt(&self, status: Option<StatusCode>, action: &str) {
        if !self.log_attempts {
            return;
        }
        let status = status.map(|s| s.as_u16());
        let latency_ms = self.latency.as_millis() as u64;
        if action == "success" {
            tracing::debug!(
                url = %self.url,
                attempt = self.attempts,
                ?status,
                latency_ms,
                job = self.job_number,
                "Attempt succeeded"
            );
        } else {
            tracing::info!(
                url = %self.url,
                attempt = self.attempts,
                max_attempts = self.max_attempts,
                ?status,
                latency_ms,
                job = self.job_number,
                action,
                "Attempt did not succeed"
            );
        }
    }
}
