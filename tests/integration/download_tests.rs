//! Streaming download tests

use crate::common::{counting_hooks, truncated_body_server};
use gatherer::crawler::{Hooks, RequestContext, DOWNLOAD_CHUNK_SIZE};
use gatherer::state::Outcome;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_download_into_memory_tracks_progress() {
    let body = payload(3 * DOWNLOAD_CHUNK_SIZE);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/archive.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let (hooks, counts) = counting_hooks();
    let mut ctx = RequestContext::get(Client::new(), &format!("{}/archive.bin", server.uri()))
        .unwrap()
        .with_hooks(hooks);

    let mut sink: Vec<u8> = Vec::new();
    let outcome = ctx.download(&mut sink).await;

    assert_eq!(outcome, Outcome::Succeeded);
    assert_eq!(sink, body);
    assert_eq!(counts.succeed(), 1);

    let progress = ctx.progress().expect("Progress is recorded");
    assert_eq!(progress.transferred, body.len() as u64);
    assert_eq!(progress.total, Some(body.len() as u64));
    assert_eq!(progress.percent(), Some(100.0));
    assert!(ctx.resp_body().is_empty());
}

#[tokio::test]
async fn test_success_hook_sees_final_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload(4096)))
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    let hooks = Hooks::new().on_succeed(move |ctx| {
        *slot.lock().unwrap() = ctx.progress();
    });

    let mut ctx = RequestContext::get(Client::new(), &server.uri())
        .unwrap()
        .with_hooks(hooks);
    ctx.download(tokio::io::sink()).await;

    let progress = seen.lock().unwrap().expect("Hook ran");
    assert_eq!(progress.transferred, 4096);
}

#[tokio::test]
async fn test_download_to_path() {
    let body = payload(250_000);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("download.bin");

    let mut ctx = RequestContext::get(Client::new(), &server.uri()).unwrap();
    let outcome = ctx.download_to_path(&target).await;

    assert_eq!(outcome, Outcome::Succeeded);
    assert_eq!(std::fs::read(&target).unwrap(), body);
}

#[tokio::test]
async fn test_download_retries_then_streams() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let (hooks, counts) = counting_hooks();
    let mut ctx = RequestContext::get(Client::new(), &server.uri())
        .unwrap()
        .with_hooks(hooks);

    let mut sink: Vec<u8> = Vec::new();
    assert_eq!(ctx.download(&mut sink).await, Outcome::Succeeded);
    assert_eq!(sink, b"finally");
    assert_eq!(ctx.attempts(), 3);
    assert_eq!(counts.retry(), 2);
}

#[tokio::test]
async fn test_exhausted_download_creates_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("never.bin");

    let mut ctx = RequestContext::get(Client::new(), &server.uri())
        .unwrap()
        .with_max_attempts(2);
    let outcome = ctx.download_to_path(&target).await;

    assert_eq!(outcome, Outcome::RetryBudgetExceeded);
    assert!(!target.exists());
    assert!(ctx.progress().is_none());
}

#[tokio::test]
async fn test_unwritable_path_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("missing").join("file.bin");

    let (hooks, counts) = counting_hooks();
    let mut ctx = RequestContext::get(Client::new(), &server.uri())
        .unwrap()
        .with_hooks(hooks);

    assert_eq!(ctx.download_to_path(&target).await, Outcome::Failed);
    assert_eq!(counts.fail(), 1);
    assert_eq!(counts.succeed(), 0);
    assert!(matches!(
        ctx.last_error(),
        Some(gatherer::FetchError::Sink { .. })
    ));
}

#[tokio::test]
async fn test_truncated_stream_keeps_received_bytes() {
    let (url, _) = truncated_body_server(100, 10).await;

    let (hooks, counts) = counting_hooks();
    let mut ctx = RequestContext::get(Client::new(), &url)
        .unwrap()
        .with_hooks(hooks);

    let mut sink: Vec<u8> = Vec::new();
    let outcome = ctx.download(&mut sink).await;

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(ctx.attempts(), 1);
    assert_eq!(sink.len(), 10);
    assert_eq!(counts.fail(), 1);
    assert_eq!(counts.retry(), 0);
    assert_eq!(counts.succeed(), 0);

    let progress = ctx.progress().expect("Progress is recorded");
    assert_eq!(progress.transferred, 10);
    assert_eq!(progress.total, Some(100));
    assert!(matches!(
        ctx.last_error(),
        Some(gatherer::FetchError::BodyRead { .. })
    ));
}
