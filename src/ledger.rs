//! Durable record of albums already fully downloaded.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::Result;
use crate::url::AlbumId;

/// Append-only dedup ledger backed by a line-oriented text file.
///
/// The file is read fully into memory once at load time and the handle is
/// released; afterwards `record` reopens it in append mode per write. Both
/// the in-memory set and the append path are guarded by one mutex, so
/// concurrent album workflows can never interleave writes or observe the
/// set and the file out of sync. External edits to the file during a run
/// are not picked up.
#[derive(Debug)]
pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

#[derive(Debug)]
struct LedgerInner {
    seen: HashSet<AlbumId>,
    path: PathBuf,
}

impl Ledger {
    /// Loads the ledger from `path`. A missing file is an empty ledger;
    /// duplicate lines collapse into the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut seen = HashSet::new();

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        seen.insert(AlbumId::from_raw(trimmed));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            inner: Mutex::new(LedgerInner { seen, path }),
        })
    }

    /// Returns true if the album was already recorded as fully downloaded.
    #[must_use]
    pub fn contains(&self, id: &AlbumId) -> bool {
        self.lock().seen.contains(id)
    }

    /// Records an album as fully downloaded, appending one line to the
    /// backing file. Recording an id twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing file cannot be opened or written;
    /// the in-memory set is left unchanged in that case.
    pub fn record(&self, id: &AlbumId) -> Result<()> {
        let mut inner = self.lock();
        if inner.seen.contains(id) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.path)?;
        writeln!(file, "{id}")?;

        inner.seen.insert(id.clone());
        Ok(())
    }

    /// Number of recorded albums.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    /// Returns true if no album has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        self.inner.lock().expect("ledger mutex poisoned")
    }
}
