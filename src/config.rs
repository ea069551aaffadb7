//! Scanner configuration.
//!
//! Loaded from config.json at startup. Every field has a default, so a missing
//! or partial file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geometry::{ICON_MARKER, OVERLAY_MARKER};

/// Complete scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// SQLite database receiving the `parts` rows
    pub database_path: PathBuf,
    /// Directory of `<feature>.png` reference icons
    pub icons_dir: PathBuf,
    /// Recognition workers; 0 means one per hardware thread
    pub worker_count: usize,
    /// Captured images waiting for recognition
    pub capture_queue_capacity: usize,
    /// Finished records waiting for the database
    pub record_queue_capacity: usize,
    /// Queue poll timeout, bounds how long a worker takes to notice shutdown
    pub poll_interval_ms: u64,
    /// How long shutdown waits for each worker
    pub join_timeout_ms: u64,
    /// Gray value of the overlay border
    pub overlay_marker_value: u8,
    /// Gray value of the icon strokes
    pub icon_marker_value: u8,
    /// Minimum similarity for an icon to count as a match
    pub icon_match_threshold: f64,
    /// Explicit Tesseract executable
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata_dir: Option<PathBuf>,
    /// Download eng.traineddata when none is installed
    pub download_tessdata: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            database_path: crate::paths::get_default_database_path(),
            icons_dir: crate::paths::get_icons_dir(),
            worker_count: 0,
            capture_queue_capacity: 16,
            record_queue_capacity: 64,
            poll_interval_ms: 500,
            join_timeout_ms: 5000,
            overlay_marker_value: OVERLAY_MARKER,
            icon_marker_value: ICON_MARKER,
            icon_match_threshold: 0.3,
            tesseract_path: None,
            tessdata_dir: None,
            download_tessdata: true,
        }
    }
}

impl ScannerConfig {
    /// Number of recognition workers to start.
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Returns the default config location: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path` or returns defaults.
pub fn load_config(path: &Path) -> ScannerConfig {
    log::info!("Looking for config at: {}", path.display());

    if !path.exists() {
        log::info!("{} not found. Using default config.", path.display());
        return ScannerConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                log::info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "Failed to parse {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                ScannerConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            ScannerConfig::default()
        }
    }
}
