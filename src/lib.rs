//! album-dl - a library for downloading remote albums of image assets.
//!
//! The pipeline resolves an album URL into a list of assets, fetches them
//! through a bounded worker pool with per-asset retry, reports progress to a
//! pluggable sink, and records fully downloaded albums in a durable ledger
//! so they are never fetched twice.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use album_dl::{AppConfig, Ledger, NoProgress, Orchestrator, PixivResolver};
//!
//! # async fn example() -> album_dl::Result<()> {
//! let config = AppConfig::load()?;
//! let ledger = Arc::new(Ledger::load(&config.paths.ledger_path)?);
//! let resolver = PixivResolver::new(config.download.request_timeout)?;
//! let orchestrator = Orchestrator::new(resolver, ledger, &config, Arc::new(NoProgress))?;
//!
//! let result = orchestrator
//!     .process("https://www.pixiv.net/en/artworks/129874560")
//!     .await?;
//! println!("downloaded {} of {} asset(s)", result.succeeded, result.total);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod album;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod format;
pub mod ledger;
pub mod paths;
pub mod progress;
pub mod resolve;
pub mod retry;
pub mod url;

// Re-export main types for convenience
pub use album::Orchestrator;
pub use config::{AppConfig, DownloadConfig, PathConfig};
pub use download::{AlbumResult, AssetTask, DownloadOutcome, run_album};
pub use error::{Error, Result};
pub use fetch::{FetchError, Fetcher, HttpTransport, Transport, TransportResponse};
pub use format::{format_bytes, format_duration};
pub use ledger::Ledger;
pub use paths::PathPlanner;
pub use progress::{
    LogSink, NoProgress, ProgressCounters, ProgressEvent, ProgressSink, ProgressSnapshot, Tee,
};
pub use resolve::{AlbumResolver, AssetRef, PixivResolver};
pub use retry::RetryPolicy;
pub use url::{AlbumId, parse_url_list};
