//! Worker pool tests against a mock server

use crate::common::{counting_hooks, recorder};
use gatherer::crawler::{start_job_get, Hooks, JobScheduler};
use gatherer::queue::{Task, TaskQueue};
use gatherer::state::{Cookie, CookiePool};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAST_IDLE: Duration = Duration::from_millis(5);

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

fn seed(queue: &Arc<TaskQueue>, server: &MockServer, count: usize) {
    for i in 0..count {
        queue.add(Task::new(format!("{}/page/{}", server.uri(), i)).with_metadata("number", i));
    }
}

#[tokio::test]
async fn test_exhausted_tasks_are_not_retried_by_scheduler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 3);

    let (hooks, counts) = counting_hooks();
    let report = JobScheduler::new(Arc::clone(&queue), Client::new(), hooks)
        .workers(2)
        .max_attempts(2)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    assert_eq!(requested_paths(&server).await.len(), 6);
    assert_eq!(counts.retry(), 6);
    assert_eq!(counts.fail(), 0);
    assert_eq!(report.exhausted, 3);
    assert_eq!(report.total(), 3);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_single_worker_preserves_fifo_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 5);

    let report = JobScheduler::new(queue, Client::new(), Hooks::new())
        .workers(1)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    assert_eq!(report.succeeded, 5);
    let expected: Vec<String> = (0..5).map(|i| format!("/page/{}", i)).collect();
    assert_eq!(requested_paths(&server).await, expected);
}

#[tokio::test]
async fn test_requeue_from_fail_hook_is_processed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(20)))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 6);

    let hooks = Hooks::new().on_fail(|ctx| {
        if ctx.task().map_or(false, |t| t.requeue_count() < 1) {
            ctx.requeue_task().unwrap();
        }
    });

    let report = JobScheduler::new(Arc::clone(&queue), Client::new(), hooks)
        .workers(4)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    let paths = requested_paths(&server).await;
    assert_eq!(paths.len(), 12);
    for i in 0..6 {
        let target = format!("/page/{}", i);
        assert_eq!(paths.iter().filter(|p| **p == target).count(), 2);
    }
    assert_eq!(report.failed, 12);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_requeue_on_last_task_keeps_run_alive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    queue.add(Task::new(format!("{}/only", server.uri())));

    // The retry hook hands the task back, then its single attempt is exhausted
    let hooks = Hooks::new().on_retry(|ctx| {
        if ctx.task().map_or(false, |t| t.requeue_count() == 0) {
            ctx.requeue_task().unwrap();
        }
    });

    let report = JobScheduler::new(Arc::clone(&queue), Client::new(), hooks)
        .workers(3)
        .max_attempts(1)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    assert_eq!(report.exhausted, 1);
    assert_eq!(report.succeeded, 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_pooled_cookie_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("cookie", "session=pooled"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 3);

    let pool: CookiePool = vec![Cookie::new("session", "pooled")].into_iter().collect();
    let report = JobScheduler::new(queue, Client::new(), Hooks::new())
        .workers(2)
        .cookie_pool(Arc::new(pool))
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_task_metadata_reaches_hooks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    queue.add(
        Task::new(format!("{}/item", server.uri()))
            .with_metadata("label", "first")
            .with_metadata("number", 256),
    );

    let seen = recorder();
    let log = Arc::clone(&seen);
    let hooks = Hooks::new().on_succeed(move |ctx| {
        let task = ctx.task().expect("Task is bound");
        log.lock().unwrap().push(format!(
            "{}:{}:{}:{}",
            task.metadata["label"].as_str().unwrap_or_default(),
            task.metadata["number"],
            ctx.resp_text(),
            ctx.job_number()
        ));
    });

    JobScheduler::new(queue, Client::new(), hooks)
        .workers(1)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    assert_eq!(*seen.lock().unwrap(), vec!["first:256:payload:1".to_string()]);
}

#[tokio::test]
async fn test_many_tasks_each_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(5)))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 50);

    let (hooks, counts) = counting_hooks();
    let report = JobScheduler::new(queue, Client::new(), hooks)
        .workers(8)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    assert_eq!(report.succeeded, 50);
    assert_eq!(counts.succeed(), 50);
    assert_eq!(counts.start(), 50);

    let mut per_path: HashMap<String, usize> = HashMap::new();
    for p in requested_paths(&server).await {
        *per_path.entry(p).or_default() += 1;
    }
    assert_eq!(per_path.len(), 50);
    assert!(per_path.values().all(|n| *n == 1));
}

#[tokio::test]
async fn test_panicking_hook_does_not_stop_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page/0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 4);

    let hooks = Hooks::new().on_succeed(|_| panic!("hook blew up"));
    let report = JobScheduler::new(Arc::clone(&queue), Client::new(), hooks)
        .workers(2)
        .idle_backoff(FAST_IDLE)
        .run()
        .await;

    // The panicking task is lost with its worker; the rest still complete
    assert_eq!(report.failed, 3);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_start_job_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let queue = TaskQueue::new();
    seed(&queue, &server, 4);

    let report = start_job_get(2, Arc::clone(&queue), Client::new(), Hooks::new()).await;

    assert_eq!(report.succeeded, 4);
    assert!(queue.is_empty());
}
