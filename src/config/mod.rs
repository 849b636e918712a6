//! Configuration types for the download pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Tunables for the per-album download pool and fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Number of assets fetched concurrently within one album.
    pub concurrent_downloads: usize,
    /// Whether to re-download assets whose destination already exists.
    pub force_overwrite: bool,
    /// Per-request timeout, covering connect and body transfer.
    pub request_timeout: Duration,
    /// Retry policy for transient fetch failures.
    pub retry: RetryPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrent_downloads: 4,
            force_overwrite: false,
            request_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent asset downloads.
    #[must_use]
    pub const fn with_concurrent_downloads(mut self, concurrent: usize) -> Self {
        self.concurrent_downloads = concurrent;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets whether to overwrite existing destinations.
    #[must_use]
    pub const fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }
}

/// Filesystem locations used by the pipeline.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Root directory album subdirectories are created under.
    pub download_dir: PathBuf,
    /// Ledger of already-downloaded albums.
    pub ledger_path: PathBuf,
    /// Batch-mode input list of album URLs.
    pub url_list_path: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("Downloads"),
            ledger_path: PathBuf::from("already_downloaded.txt"),
            url_list_path: PathBuf::from("URLs.txt"),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Download configuration.
    pub download: DownloadConfig,
    /// Path configuration.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from defaults.
    /// In the future, this can be extended to load from config files.
    pub fn load() -> crate::Result<Self> {
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_download_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.concurrent_downloads, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.force_overwrite);
    }

    #[test]
    fn download_config_builder_pattern() {
        let config = DownloadConfig::new()
            .with_concurrent_downloads(8)
            .with_request_timeout(Duration::from_secs(5))
            .with_force_overwrite(true)
            .with_retry(RetryPolicy::default().with_max_attempts(1));

        assert_eq!(config.concurrent_downloads, 8);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.force_overwrite);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn download_config_serializes_to_toml() {
        let config = DownloadConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: DownloadConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            deserialized.concurrent_downloads,
            config.concurrent_downloads
        );
        assert_eq!(deserialized.request_timeout, config.request_timeout);
        assert_eq!(deserialized.force_overwrite, config.force_overwrite);
    }

    #[test]
    fn default_path_config_uses_fixed_relative_paths() {
        let config = PathConfig::default();
        assert_eq!(config.download_dir, PathBuf::from("Downloads"));
        assert_eq!(config.ledger_path, PathBuf::from("already_downloaded.txt"));
        assert_eq!(config.url_list_path, PathBuf::from("URLs.txt"));
    }

    #[test]
    fn app_config_load() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.download.concurrent_downloads, 4);
        assert_eq!(config.paths.download_dir, PathBuf::from("Downloads"));
    }
}
