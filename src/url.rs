//! Album URL normalization and input-list parsing.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static ARTWORK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"artworks/(\d+)").expect("valid regex"));

/// Canonical identifier of one remote album.
///
/// Derived by normalizing the album URL: artwork pages reduce to their
/// numeric id, anything else to its last path segment. Two URLs naming the
/// same remote album always normalize to the same identifier, so the id is
/// safe to use as a ledger key and as a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumId(String);

impl AlbumId {
    /// Derives the identifier from an album URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when no identifier can be extracted.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidUrl("empty URL".to_string()));
        }

        if let Some(caps) = ARTWORK_RE.captures(url) {
            return Ok(Self(caps[1].to_string()));
        }

        // Fall back to the last path segment, ignoring query/fragment noise.
        let stripped = url.split(['?', '#']).next().unwrap_or(url);
        stripped
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .map(|s| Self(s.to_string()))
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))
    }

    /// Wraps an already-normalized identifier, e.g. one read back from the
    /// ledger file.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a newline-delimited album URL list.
///
/// Blank lines and surrounding whitespace are ignored. Order is preserved
/// and duplicates are kept; dedup happens against the ledger at process
/// time, so a URL repeated in the list is simply skipped on its second pass.
#[must_use]
pub fn parse_url_list(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
