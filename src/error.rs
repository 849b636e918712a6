//! Error types for the album-dl library.

use thiserror::Error;

/// Errors that can occur while processing albums.
#[derive(Error, Debug)]
pub enum Error {
    /// The album page could not be fetched or understood.
    #[error("album resolution failed: {0}")]
    Resolution(String),

    /// The given URL does not name a recognizable album.
    #[error("invalid album URL: {0}")]
    InvalidUrl(String),

    /// I/O error from the ledger or filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for album-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
