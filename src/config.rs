//! User settings for jiukisidian
//!
//! Read from `settings.json` in the config directory. Missing keys fall back
//! to defaults; a missing file is not an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::BoardOptions;
use crate::error::Result;
use crate::note::ResizePolicy;
use crate::pages::MAX_PAGES;
use crate::storage::default_storage_dir;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Where the project index and snapshots live
    pub storage_dir: PathBuf,
    /// Default destination for exports and project files
    pub export_dir: PathBuf,
    pub max_pages: usize,
    pub resize_policy: ResizePolicy,
    pub undo_history: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            export_dir: dirs::download_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            max_pages: MAX_PAGES,
            resize_policy: ResizePolicy::default(),
            undo_history: 100,
        }
    }
}

impl Settings {
    /// Load settings from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or does not parse
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Self::default()
        })
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        config_dir.join("jiukisidian").join(SETTINGS_FILE)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn board_options(&self) -> BoardOptions {
        BoardOptions {
            resize_policy: self.resize_policy,
            max_pages: self.max_pages,
            undo_history: self.undo_history,
        }
    }
}
