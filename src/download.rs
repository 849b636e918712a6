//! Task types and the bounded concurrent download pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use crate::fetch::{Fetcher, Transport};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::url::AlbumId;

/// One asset's planned download. Created once by the orchestrator from the
/// resolved asset list; consumed exactly once by the pool; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTask {
    /// Source URL of the asset.
    pub url: String,
    /// Planned destination path.
    pub dest: PathBuf,
    /// Sequence index of the asset within its album.
    pub index: usize,
}

/// Terminal state of one asset task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The asset was downloaded; `bytes` body bytes were written.
    Success { bytes: u64 },
    /// The asset failed terminally (retries already spent inside the fetcher).
    Failed { reason: String },
    /// The asset was never fetched.
    Skipped { reason: String },
}

/// Aggregate result of one album run.
#[derive(Debug, Clone)]
pub struct AlbumResult {
    /// The album's canonical identifier.
    pub id: AlbumId,
    /// Number of tasks dispatched.
    pub total: usize,
    /// Assets downloaded successfully.
    pub succeeded: usize,
    /// `(index, reason)` for every failed asset, ordered by index.
    pub failed: Vec<(usize, String)>,
    /// Assets skipped because they were already on disk.
    pub skipped_assets: usize,
    /// Assets skipped because shutdown was requested before they started.
    pub cancelled: usize,
    /// True when the album was found in the ledger and nothing was fetched.
    pub already_complete: bool,
}

impl AlbumResult {
    /// Result for an album the ledger already records as done.
    #[must_use]
    pub fn already_complete(id: AlbumId) -> Self {
        Self {
            id,
            total: 0,
            succeeded: 0,
            failed: Vec::new(),
            skipped_assets: 0,
            cancelled: 0,
            already_complete: true,
        }
    }

    /// True when every asset reached disk (or was already there) and the
    /// run was not cut short. This is the condition for recording the album.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled == 0 && !self.already_complete
    }

    fn from_outcomes(
        id: AlbumId,
        total: usize,
        outcomes: Vec<(usize, DownloadOutcome)>,
        cancelled: usize,
    ) -> Self {
        debug_assert_eq!(outcomes.len(), total, "every task accounted for once");

        let mut succeeded = 0;
        let mut skipped_assets = 0;
        let mut failed = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                DownloadOutcome::Success { .. } => succeeded += 1,
                DownloadOutcome::Skipped { .. } => skipped_assets += 1,
                DownloadOutcome::Failed { reason } => failed.push((index, reason)),
            }
        }
        failed.sort_by_key(|(index, _)| *index);
        // Shutdown skips are already inside skipped_assets; carve them out.
        let skipped_assets = skipped_assets - cancelled;

        Self {
            id,
            total,
            succeeded,
            failed,
            skipped_assets,
            cancelled,
            already_complete: false,
        }
    }
}

const SHUTDOWN_REASON: &str = "shutdown requested";

/// Fans an album's tasks across a bounded worker pool and aggregates the
/// outcomes.
///
/// At most `concurrent_downloads` fetches run at once. Completion order is
/// irrelevant: every task contributes exactly one outcome, a failed asset
/// never aborts its siblings, and the call returns only when all tasks are
/// terminal. Once `shutdown` fires, tasks that have not started finalize as
/// skipped while in-flight transfers run to completion.
pub async fn run_album<T: Transport>(
    id: &AlbumId,
    tasks: &[AssetTask],
    fetcher: &Fetcher<T>,
    sink: &Arc<dyn ProgressSink>,
    shutdown: &CancellationToken,
) -> AlbumResult {
    sink.on_event(&ProgressEvent::AlbumStarted {
        album: id.clone(),
        total: tasks.len(),
    });

    let cancelled = AtomicUsize::new(0);

    let outcomes: Vec<(usize, DownloadOutcome)> = stream::iter(tasks)
        .map(|task| {
            let cancelled = &cancelled;
            async move {
                if shutdown.is_cancelled() {
                    cancelled.fetch_add(1, Ordering::Relaxed);
                    sink.on_event(&ProgressEvent::Skipped {
                        album: id.clone(),
                        index: task.index,
                        reason: SHUTDOWN_REASON.to_string(),
                    });
                    return (
                        task.index,
                        DownloadOutcome::Skipped {
                            reason: SHUTDOWN_REASON.to_string(),
                        },
                    );
                }
                (task.index, fetcher.fetch(id, task, sink.as_ref()).await)
            }
        })
        .buffer_unordered(fetcher.config().concurrent_downloads.max(1))
        .collect()
        .await;

    AlbumResult::from_outcomes(
        id.clone(),
        tasks.len(),
        outcomes,
        cancelled.load(Ordering::Relaxed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloadConfig;
    use crate::fetch::{FetchError, TransportResponse};
    use crate::progress::NoProgress;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt as _;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Transport that fails any URL containing "bad" and serves the rest.
    struct SelectiveTransport;

    #[async_trait]
    impl Transport for SelectiveTransport {
        async fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
            if url.contains("bad") {
                return Err(FetchError::Permanent("server responded 404".to_string()));
            }
            Ok(TransportResponse {
                length: None,
                body: futures::stream::iter(vec![Ok(Bytes::from_static(b"pixels"))]).boxed(),
            })
        }
    }

    fn fetcher(concurrent: usize) -> Fetcher<SelectiveTransport> {
        let config = DownloadConfig {
            concurrent_downloads: concurrent,
            retry: RetryPolicy::default().with_initial_delay(Duration::from_millis(1)),
            ..DownloadConfig::default()
        };
        Fetcher::with_transport(SelectiveTransport, config)
    }

    fn tasks_in(dir: &TempDir, urls: &[&str]) -> Vec<AssetTask> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| AssetTask {
                url: (*url).to_string(),
                dest: dir.path().join(format!("4242/asset_{index}")),
                index,
            })
            .collect()
    }

    fn sink() -> Arc<dyn ProgressSink> {
        Arc::new(NoProgress)
    }

    fn album() -> AlbumId {
        AlbumId::from_raw("4242")
    }

    #[tokio::test]
    async fn every_task_accounted_for_exactly_once() {
        let dir = TempDir::new().unwrap();
        let urls: Vec<String> = (0..10).map(|i| format!("https://i.example/{i}")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let tasks = tasks_in(&dir, &url_refs);

        let result = run_album(
            &album(),
            &tasks,
            &fetcher(3),
            &sink(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.total, 10);
        assert_eq!(result.succeeded, 10);
        assert!(result.failed.is_empty());
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn failures_are_isolated_from_siblings() {
        let dir = TempDir::new().unwrap();
        let tasks = tasks_in(
            &dir,
            &[
                "https://i.example/ok0",
                "https://i.example/bad1",
                "https://i.example/ok2",
                "https://i.example/bad3",
                "https://i.example/ok4",
            ],
        );

        let result = run_album(
            &album(),
            &tasks,
            &fetcher(2),
            &sink(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.total, 5);
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed.len(), 2);
        let failed_indexes: Vec<usize> = result.failed.iter().map(|(i, _)| *i).collect();
        assert_eq!(failed_indexes, vec![1, 3], "sorted by index");
        assert!(!result.is_complete());
        // The siblings of failed tasks still landed on disk.
        assert!(dir.path().join("4242/asset_0").exists());
        assert!(dir.path().join("4242/asset_4").exists());
    }

    #[tokio::test]
    async fn cancelled_pool_skips_unstarted_tasks() {
        let dir = TempDir::new().unwrap();
        let tasks = tasks_in(&dir, &["https://i.example/a", "https://i.example/b"]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = run_album(&album(), &tasks, &fetcher(2), &sink(), &shutdown).await;

        assert_eq!(result.cancelled, 2);
        assert_eq!(result.succeeded, 0);
        assert!(result.failed.is_empty());
        assert!(!result.is_complete(), "a cut-short album is never complete");
    }

    #[tokio::test]
    async fn empty_album_is_trivially_complete() {
        let result = run_album(
            &album(),
            &[],
            &fetcher(4),
            &sink(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.total, 0);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn concurrent_tasks_share_one_album_directory() {
        let dir = TempDir::new().unwrap();
        let urls: Vec<String> = (0..8).map(|i| format!("https://i.example/{i}")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let tasks = tasks_in(&dir, &url_refs);

        // All eight workers race to create the same parent directory.
        let result = run_album(
            &album(),
            &tasks,
            &fetcher(8),
            &sink(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.succeeded, 8);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "exactly one album directory");
    }

    #[test]
    fn already_complete_result_shape() {
        let result = AlbumResult::already_complete(album());
        assert!(result.already_complete);
        assert!(!result.is_complete(), "nothing to record again");
        assert_eq!(result.total, 0);
    }
}
