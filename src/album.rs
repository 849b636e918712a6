//! Per-album orchestration: dedup check, resolution, dispatch, recording.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::download::{AlbumResult, AssetTask, run_album};
use crate::error::Result;
use crate::fetch::{Fetcher, HttpTransport, Transport};
use crate::ledger::Ledger;
use crate::paths::PathPlanner;
use crate::progress::ProgressSink;
use crate::resolve::AlbumResolver;
use crate::url::AlbumId;

/// Ties the pipeline together for one album URL at a time.
///
/// The batch driver calls [`process`](Self::process) once per URL; each call
/// is independent, and a shared ledger keeps repeated URLs from doing
/// repeated work.
pub struct Orchestrator<T: Transport = HttpTransport> {
    resolver: Box<dyn AlbumResolver>,
    fetcher: Fetcher<T>,
    ledger: Arc<Ledger>,
    sink: Arc<dyn ProgressSink>,
    download_root: PathBuf,
    shutdown: CancellationToken,
}

impl Orchestrator<HttpTransport> {
    /// Creates an orchestrator backed by a real HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        resolver: impl AlbumResolver + 'static,
        ledger: Arc<Ledger>,
        config: &AppConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(config.download.clone())?;
        Ok(Self::with_fetcher(
            resolver,
            fetcher,
            ledger,
            config.paths.download_dir.clone(),
            sink,
        ))
    }
}

impl<T: Transport> Orchestrator<T> {
    /// Creates an orchestrator with a custom fetcher (and transport).
    pub fn with_fetcher(
        resolver: impl AlbumResolver + 'static,
        fetcher: Fetcher<T>,
        ledger: Arc<Ledger>,
        download_root: PathBuf,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            resolver: Box::new(resolver),
            fetcher,
            ledger,
            sink,
            download_root,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops new work when cancelled. In-flight transfers finish;
    /// tasks not yet started are skipped and the album stays unrecorded.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Processes one album URL end to end.
    ///
    /// An album already in the ledger returns immediately with an
    /// already-complete result and zero network calls. Otherwise the asset
    /// list is resolved, every asset is planned and dispatched through the
    /// pool, and the album is recorded only when nothing failed and nothing
    /// was cut short. A failed album stays unrecorded so the next run
    /// retries it.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidUrl`] and [`crate::Error::Resolution`] abort
    /// this album only; [`crate::Error::Io`] from the ledger means progress
    /// can no longer be recorded durably and is fatal for the run.
    pub async fn process(&self, url: &str) -> Result<AlbumResult> {
        let id = AlbumId::from_url(url)?;

        if self.ledger.contains(&id) {
            log::info!("album {id} already downloaded, skipping");
            return Ok(AlbumResult::already_complete(id));
        }

        let assets = self.resolver.resolve(url).await?;

        let mut planner = PathPlanner::new(&self.download_root, &id);
        let tasks: Vec<AssetTask> = assets
            .iter()
            .enumerate()
            .map(|(index, asset)| AssetTask {
                url: asset.url.clone(),
                dest: planner.plan(index, asset.suggested_filename.as_deref()),
                index,
            })
            .collect();

        let result = run_album(&id, &tasks, &self.fetcher, &self.sink, &self.shutdown).await;

        if result.is_complete() {
            self.ledger.record(&id)?;
        } else if !result.failed.is_empty() {
            log::warn!(
                "album {id}: {} of {} asset(s) failed, leaving unrecorded for a future retry",
                result.failed.len(),
                result.total
            );
        }

        Ok(result)
    }
}
