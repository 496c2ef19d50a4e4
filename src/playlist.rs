//! Ordered playlist of the video files in one folder.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// Recognized video file extensions (lowercase, no dot)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "3gp",
];

/// Whether a path carries a recognized video extension.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// List the video files directly inside `folder`, sorted by file name.
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read folder: {}", folder.display()))?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_video_file(path))
        .collect();
    files.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));

    debug!("Scanned {}: {} video files", folder.display(), files.len());
    Ok(files)
}

/// Ordered file list of one folder plus the current index. The list is
/// immutable once built for a given open-folder action; only the index
/// moves, and it never wraps.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    folder: Option<PathBuf>,
    files: Vec<PathBuf>,
    current: Option<usize>,
}

impl Playlist {
    /// Empty playlist (single-file mode).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a playlist from a scanned folder. Starts at the first file.
    pub fn from_folder(folder: PathBuf, files: Vec<PathBuf>) -> Self {
        let current = if files.is_empty() { None } else { Some(0) };
        Self {
            folder: Some(folder),
            files,
            current,
        }
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Index of the current file, `None` in single-file mode.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Path of the current file.
    pub fn current(&self) -> Option<&Path> {
        self.current.and_then(|i| self.files.get(i)).map(PathBuf::as_path)
    }

    /// Advance to the next file, or `None` when already at the last one.
    pub fn next(&mut self) -> Option<&Path> {
        let i = self.current?;
        if i + 1 >= self.files.len() {
            return None;
        }
        self.current = Some(i + 1);
        self.current()
    }

    /// Step back to the previous file, or `None` when already at the first.
    pub fn previous(&mut self) -> Option<&Path> {
        let i = self.current?;
        if i == 0 {
            return None;
        }
        self.current = Some(i - 1);
        self.current()
    }

    /// Jump to an arbitrary index, or `None` when out of range.
    pub fn jump(&mut self, index: usize) -> Option<&Path> {
        if index >= self.files.len() {
            return None;
        }
        self.current = Some(index);
        self.current()
    }

    /// Drop the folder context (back to single-file mode).
    pub fn clear(&mut self) {
        self.folder = None;
        self.files.clear();
        self.current = None;
    }
}
