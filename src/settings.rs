//! Playback settings persistence: per-folder skip/progress records, the
//! global defaults record, and the default-player preference flag.
//!
//! Every record is a whole JSON document, read and replaced atomically at
//! the document level. Folder records are keyed by a fingerprint of the
//! normalized folder path. All read/parse failures fall back to defaults;
//! write failures are logged and dropped so playback is never interrupted
//! by a persistence problem.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const GLOBAL_SETTINGS_FILE: &str = "global_settings.json";
const PREFS_FILE: &str = "default_player.json";
const FOLDER_FILE_PREFIX: &str = "folder_";

/// Process-wide playback defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Playback speed multiplier
    pub speed: f64,
    /// Fast-forward/rewind step in seconds
    pub seek_step: u32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            seek_step: 10,
        }
    }
}

/// Per-folder playback settings and per-file progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSettings {
    /// Original folder path, kept for human inspection of the record
    pub folder_path: String,
    /// Seconds to skip at the start of every file in the folder
    pub skip_intro: u32,
    /// Seconds to cut from the end of every file in the folder
    pub skip_outro: u32,
    /// Watched percentage per file name, one decimal of precision
    pub progress: BTreeMap<String, f64>,
}

/// "Set as default player" prompt preference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerPrefs {
    /// User chose "never ask again"
    pub never_ask: bool,
}

/// Fingerprint of a folder: first 16 hex chars of the SHA-256 of the
/// normalized absolute path string. Deterministic for the same string;
/// a renamed folder is a different folder.
pub fn folder_fingerprint(folder: &Path) -> String {
    let normalized = normalize_path(folder);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Lexically absolutize a path (no symlink resolution, so missing folders
/// still fingerprint consistently).
fn normalize_path(path: &Path) -> String {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    abs.to_string_lossy().into_owned()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
            None
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize settings")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Read-through/write-through store for all persisted playback records.
///
/// The folder cache is shared between the session controller and playlist
/// display collaborators; a store-level mutex serializes access so a
/// progress write cannot race a skip-value edit.
pub struct SettingsStore {
    settings_dir: PathBuf,
    prefs_path: PathBuf,
    folders: Mutex<HashMap<PathBuf, FolderSettings>>,
    global: Mutex<Option<GlobalSettings>>,
}

impl SettingsStore {
    /// Create a store rooted at `base_dir`. Folder and global records live
    /// in `base_dir/settings/`, the prefs record next to them.
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            settings_dir: base_dir.join("settings"),
            prefs_path: base_dir.join(PREFS_FILE),
            folders: Mutex::new(HashMap::new()),
            global: Mutex::new(None),
        }
    }

    /// Directory holding the per-folder records.
    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }

    fn folder_of(file_path: &Path) -> PathBuf {
        file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn record_path(&self, folder: &Path) -> PathBuf {
        let id = folder_fingerprint(folder);
        self.settings_dir
            .join(format!("{FOLDER_FILE_PREFIX}{id}.json"))
    }

    // ========== Folder settings ==========

    /// Settings of the folder containing `file_path`. Cached after the
    /// first read; a missing or unreadable record yields the default and
    /// that default becomes the cached state.
    pub fn load_settings(&self, file_path: &Path) -> FolderSettings {
        self.load_folder(&Self::folder_of(file_path))
    }

    fn load_folder(&self, folder: &Path) -> FolderSettings {
        let mut cache = self.folders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(folder) {
            return hit.clone();
        }

        let settings = read_json(&self.record_path(folder)).unwrap_or_else(|| FolderSettings {
            folder_path: normalize_path(folder),
            ..FolderSettings::default()
        });
        cache.insert(folder.to_path_buf(), settings.clone());
        settings
    }

    /// Persist settings for the folder containing `file_path`. The cache
    /// is updated first so a transient write failure never loses the
    /// in-memory state or interrupts playback.
    pub fn save_settings(&self, file_path: &Path, mut settings: FolderSettings) {
        let folder = Self::folder_of(file_path);
        settings.folder_path = normalize_path(&folder);

        let path = self.record_path(&folder);
        {
            let mut cache = self.folders.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(folder, settings.clone());
        }
        if let Err(e) = write_json(&path, &settings) {
            warn!("Failed to save folder settings: {e:#}");
        }
    }

    /// Record the watched percentage of a single file. Percentages at or
    /// below 1% are noise from a barely-opened file and are not persisted.
    pub fn save_progress(&self, file_path: &Path, percentage: f64) {
        if percentage <= 1.0 {
            debug!(
                "Skipping progress save for {} ({percentage:.1}%)",
                file_path.display()
            );
            return;
        }
        let Some(name) = file_path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return;
        };
        let mut settings = self.load_settings(file_path);
        settings
            .progress
            .insert(name, (percentage.min(100.0) * 10.0).round() / 10.0);
        self.save_settings(file_path, settings);
    }

    /// Watched percentage of a single file, 0 if unknown.
    pub fn get_progress(&self, file_path: &Path) -> f64 {
        let Some(name) = file_path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return 0.0;
        };
        self.load_settings(file_path)
            .progress
            .get(&name)
            .copied()
            .unwrap_or(0.0)
    }

    /// Progress for every file in a folder, for playlist display.
    pub fn all_progress(&self, folder: &Path) -> BTreeMap<String, f64> {
        self.load_folder(folder).progress
    }

    /// Delete every persisted folder record. Returns the number removed.
    pub fn clear_all(&self) -> usize {
        let mut count = 0;
        if let Ok(entries) = fs::read_dir(&self.settings_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with(FOLDER_FILE_PREFIX) && name.ends_with(".json") {
                    match fs::remove_file(entry.path()) {
                        Ok(()) => count += 1,
                        Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
                    }
                }
            }
        }
        self.folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        count
    }

    // ========== Global settings ==========

    /// Load the global defaults record (cached after the first read).
    pub fn load_global(&self) -> GlobalSettings {
        let mut cached = self.global.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(g) = cached.as_ref() {
            return g.clone();
        }
        let global: GlobalSettings = read_json(&self.settings_dir.join(GLOBAL_SETTINGS_FILE)).unwrap_or_default();
        *cached = Some(global.clone());
        global
    }

    /// Mutate and immediately persist the global defaults record.
    pub fn update_global(&self, update: impl FnOnce(&mut GlobalSettings)) -> GlobalSettings {
        let mut global = self.load_global();
        update(&mut global);
        {
            let mut cached = self.global.lock().unwrap_or_else(|e| e.into_inner());
            *cached = Some(global.clone());
        }
        if let Err(e) = write_json(&self.settings_dir.join(GLOBAL_SETTINGS_FILE), &global) {
            warn!("Failed to save global settings: {e:#}");
        }
        global
    }

    // ========== Default-player prefs ==========

    /// Whether the "set as default player" prompt should still be shown.
    pub fn should_ask_default(&self) -> bool {
        !read_json::<PlayerPrefs>(&self.prefs_path)
            .unwrap_or_default()
            .never_ask
    }

    /// Record the user's "never ask again" choice.
    pub fn set_never_ask(&self, value: bool) {
        let prefs = PlayerPrefs { never_ask: value };
        if let Err(e) = write_json(&self.prefs_path, &prefs) {
            warn!("Failed to save player prefs: {e:#}");
        }
    }
}
