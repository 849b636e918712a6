//! Deterministic destination planning for album assets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::url::AlbumId;

/// Plans where each asset of one album lands on disk.
///
/// Every destination lives under `<root>/<album id>/`. Names come from the
/// resolver's suggested filename when one is usable; otherwise (absent,
/// sanitized away, or already handed out for this album) the planner falls
/// back to `<album id>_<index>`, which is unique by construction because the
/// sequence index is. The planner remembers every name it has produced, so
/// two tasks of one album can never be planned onto the same path.
#[derive(Debug)]
pub struct PathPlanner {
    album: AlbumId,
    album_dir: PathBuf,
    used: HashSet<String>,
}

impl PathPlanner {
    /// Creates a planner for one album rooted at `root`.
    #[must_use]
    pub fn new(root: &Path, album: &AlbumId) -> Self {
        Self {
            album: album.clone(),
            album_dir: root.join(album.as_str()),
            used: HashSet::new(),
        }
    }

    /// Directory all of this album's assets are planned into.
    #[must_use]
    pub fn album_dir(&self) -> &Path {
        &self.album_dir
    }

    /// Plans the destination for the asset at `index`.
    pub fn plan(&mut self, index: usize, suggested: Option<&str>) -> PathBuf {
        let name = suggested
            .map(sanitize_filename)
            .filter(|n| !n.is_empty() && !self.used.contains(n))
            .unwrap_or_else(|| self.fallback_name(index, suggested));

        self.used.insert(name.clone());
        self.album_dir.join(name)
    }

    fn fallback_name(&self, index: usize, suggested: Option<&str>) -> String {
        let ext = suggested
            .and_then(|s| Path::new(s).extension())
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let base = format!("{}_{index}{ext}", self.album);
        if !self.used.contains(&base) {
            return base;
        }
        // A suggestion squatted this slot; a counter prefix keeps it unique.
        let mut n = 1;
        let mut name = format!("{n}_{base}");
        while self.used.contains(&name) {
            n += 1;
            name = format!("{n}_{base}");
        }
        name
    }
}

/// Strips path separators and other characters that would escape the album
/// directory or upset the filesystem.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_matches(['.', ' ', '_']).to_string()
}
