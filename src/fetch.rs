//! Single-asset retrieval with bounded retry and atomic part-file writes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncWriteExt;

use crate::config::DownloadConfig;
use crate::download::{AssetTask, DownloadOutcome};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::url::AlbumId;

/// Classification of a fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth another attempt: timeouts, dropped connections, 5xx responses.
    Transient(String),
    /// Retrying cannot help: 4xx responses, malformed targets, local I/O.
    Permanent(String),
}

impl FetchError {
    fn into_reason(self) -> String {
        match self {
            Self::Transient(reason) | Self::Permanent(reason) => reason,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(reason) => write!(f, "transient: {reason}"),
            Self::Permanent(reason) => write!(f, "permanent: {reason}"),
        }
    }
}

/// A response body as a stream of chunks.
pub struct TransportResponse {
    /// Declared body length, when the server sent one.
    pub length: Option<u64>,
    /// Chunked body; mid-stream errors surface as stream items.
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

/// Seam between the fetcher and the network, so tests can inject faults
/// without a live server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one GET and returns the (possibly still streaming) response.
    async fn get(&self, url: &str) -> Result<TransportResponse, FetchError>;
}

/// `reqwest`-backed transport used outside of tests.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Transient(format!("server responded {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Permanent(format!("server responded {status}")));
        }
        Ok(TransportResponse {
            length: response.content_length(),
            body: response.bytes_stream().map_err(classify).boxed(),
        })
    }
}

/// Maps a client error onto the retry taxonomy. Timeouts, connect failures,
/// and mid-body drops all read as transient; a request that could never be
/// sent does not.
fn classify(e: reqwest::Error) -> FetchError {
    if e.is_builder() || e.is_redirect() {
        FetchError::Permanent(e.to_string())
    } else {
        FetchError::Transient(e.to_string())
    }
}

/// Returns the temporary `.part` path for a final destination.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Ensures the parent directory of a destination exists. Safe to race:
/// create-if-absent never fails because a sibling worker got there first.
async fn ensure_parent_dir(dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Downloads one asset to its planned destination.
///
/// The body is streamed into `<dest>.part` and only renamed onto the final
/// path after the whole transfer succeeds, so no partial file is ever
/// observable at the destination. Transient failures are retried per the
/// configured policy; every failure mode folds into the returned outcome.
pub struct Fetcher<T: Transport = HttpTransport> {
    transport: T,
    config: DownloadConfig,
}

impl Fetcher<HttpTransport> {
    /// Creates a fetcher backed by a real HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: DownloadConfig) -> crate::Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self { transport, config })
    }
}

impl<T: Transport> Fetcher<T> {
    /// Creates a fetcher with a custom transport implementation.
    pub const fn with_transport(transport: T, config: DownloadConfig) -> Self {
        Self { transport, config }
    }

    /// Returns the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Fetches one asset. Never returns an error across this boundary:
    /// retries happen here, and whatever remains becomes the outcome.
    pub async fn fetch(
        &self,
        album: &AlbumId,
        task: &AssetTask,
        sink: &dyn ProgressSink,
    ) -> DownloadOutcome {
        if !self.config.force_overwrite
            && tokio::fs::try_exists(&task.dest).await.unwrap_or(false)
        {
            let reason = "destination already exists".to_string();
            sink.on_event(&ProgressEvent::Skipped {
                album: album.clone(),
                index: task.index,
                reason: reason.clone(),
            });
            return DownloadOutcome::Skipped { reason };
        }

        sink.on_event(&ProgressEvent::Started {
            album: album.clone(),
            index: task.index,
        });

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_fetch(album, task, sink).await {
                Ok(bytes) => {
                    sink.on_event(&ProgressEvent::Finished {
                        album: album.clone(),
                        index: task.index,
                    });
                    return DownloadOutcome::Success { bytes };
                }
                Err(FetchError::Transient(reason)) => {
                    if let Some(delay) = self.config.retry.delay_after(attempts) {
                        log::warn!(
                            "album {album}: asset {} attempt {attempts} failed ({reason}), retrying",
                            task.index
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return fail_outcome(album, task, sink, reason);
                }
                Err(e @ FetchError::Permanent(_)) => {
                    return fail_outcome(album, task, sink, e.into_reason());
                }
            }
        }
    }

    /// One attempt: stream the body into the part file, then move it into
    /// place. On any failure the part file is removed, so a crash or retry
    /// never leaves stray data at either path.
    async fn try_fetch(
        &self,
        album: &AlbumId,
        task: &AssetTask,
        sink: &dyn ProgressSink,
    ) -> Result<u64, FetchError> {
        ensure_parent_dir(&task.dest)
            .await
            .map_err(|e| FetchError::Permanent(format!("create directory: {e}")))?;

        let response = self.transport.get(&task.url).await?;
        let part = part_path(&task.dest);

        match write_body(album, task, sink, response, &part).await {
            Ok(written) => match tokio::fs::rename(&part, &task.dest).await {
                Ok(()) => Ok(written),
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    Err(FetchError::Permanent(format!(
                        "finalize {}: {e}",
                        task.dest.display()
                    )))
                }
            },
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

fn fail_outcome(
    album: &AlbumId,
    task: &AssetTask,
    sink: &dyn ProgressSink,
    reason: String,
) -> DownloadOutcome {
    sink.on_event(&ProgressEvent::Failed {
        album: album.clone(),
        index: task.index,
        reason: reason.clone(),
    });
    DownloadOutcome::Failed { reason }
}

async fn write_body(
    album: &AlbumId,
    task: &AssetTask,
    sink: &dyn ProgressSink,
    response: TransportResponse,
    part: &Path,
) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| FetchError::Permanent(format!("create {}: {e}", part.display())))?;

    let mut body = response.body;
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::Permanent(format!("write: {e}")))?;
        written += chunk.len() as u64;
        sink.on_event(&ProgressEvent::Transferred {
            album: album.clone(),
            index: task.index,
            bytes: chunk.len() as u64,
        });
    }
    file.flush()
        .await
        .map_err(|e| FetchError::Permanent(format!("flush: {e}")))?;
    Ok(written)
}
