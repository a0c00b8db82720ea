//! Streaming download variant of the request cycle
//!
//! Retry and error classification are the same as [`RequestContext::execute`];
//! only the success path differs. Instead of buffering the body, the response
//! is streamed into a sink through a fixed-size buffer while progress against
//! the declared `Content-Length` is tracked.

use crate::crawler::RequestContext;
use crate::state::Outcome;
use crate::FetchError;
use reqwest::Response;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Size of the buffer between the response stream and the sink (100 KiB)
pub const DOWNLOAD_CHUNK_SIZE: usize = 100 * 1024;

/// A progress line is logged every this many received chunks
const PROGRESS_LOG_INTERVAL: u64 = 9;

/// Bytes transferred so far against the declared total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    pub transferred: u64,
    /// From `Content-Length`; None when the server did not declare one
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Whole-number percentage complete, if the total is known and non-zero
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| ((self.transferred as f64 / total as f64) * 100.0).floor())
    }
}

impl fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.total, self.percent()) {
            (Some(total), Some(percent)) => write!(
                f,
                "{} / {} ({}%)",
                format_size(self.transferred),
                format_size(total),
                percent
            ),
            _ => write!(f, "{} / unknown", format_size(self.transferred)),
        }
    }
}

/// Formats a byte count with a binary unit suffix (e.g. `1.50 MB`)
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

impl RequestContext {
    /// Runs the request cycle and streams a success body into `sink`
    ///
    /// On success `on_succeed` fires after the sink is flushed; the buffered
    /// body stays empty. A read error mid-stream keeps whatever was already
    /// written, then ends the cycle as a failure.
    pub async fn download<W>(&mut self, sink: W) -> Outcome
    where
        W: AsyncWrite + Unpin,
    {
        match self.dispatch().await {
            Ok(response) => self.stream_response(response, sink).await,
            Err(outcome) => outcome,
        }
    }

    /// Runs the request cycle and streams a success body into a new file
    ///
    /// The file is only created once a success response has arrived.
    pub async fn download_to_path(&mut self, path: impl AsRef<Path>) -> Outcome {
        let response = match self.dispatch().await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        match tokio::fs::File::create(path.as_ref()).await {
            Ok(file) => self.stream_response(response, file).await,
            Err(source) => {
                let url = self.url().to_string();
                tracing::warn!(%url, path = %path.as_ref().display(), error = %source, "Failed to create download file");
                self.fail_with(FetchError::Sink { url, source })
            }
        }
    }

    async fn stream_response<W>(&mut self, mut response: Response, sink: W) -> Outcome
    where
        W: AsyncWrite + Unpin,
    {
        let url = self.url().to_string();
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, sink);
        let mut progress = DownloadProgress {
            transferred: 0,
            total: response.content_length(),
        };
        self.set_progress(progress);

        let started = Instant::now();
        let mut chunks: u64 = 0;
        let mut read_error = None;

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) if !chunk.is_empty() => {
                    if let Err(source) = writer.write_all(&chunk).await {
                        return self.fail_with(FetchError::Sink { url, source });
                    }
                    progress.transferred += chunk.len() as u64;
                    chunks += 1;
                    self.set_progress(progress);

                    if chunks % PROGRESS_LOG_INTERVAL == 0 && self.log_attempts() {
                        tracing::info!(%url, %progress, "Downloading");
                    }
                }
                Ok(_) => break,
                Err(source) => {
                    read_error = Some(source);
                    break;
                }
            }
        }

        if let Err(source) = writer.flush().await {
            return self.fail_with(FetchError::Sink { url, source });
        }
        drop(response);

        if self.log_attempts() {
            tracing::info!(
                %url,
                %progress,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Download finished"
            );
        }

        match read_error {
            Some(source) => self.fail_with(FetchError::BodyRead { url, source }),
            None => self.succeed(),
        }
    }
}
