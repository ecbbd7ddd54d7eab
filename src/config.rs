//! Application configuration settings.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{NsError, Result};

fn default_namespace() -> String {
    "notes".to_string()
}

fn default_store_version() -> u32 {
    2
}

fn default_autosave_delay_ms() -> u64 {
    1500
}

fn default_api_base() -> String {
    "https://api.notion.com".to_string()
}

fn default_database_title() -> String {
    "Notes Database".to_string()
}

fn default_sync_on_save() -> bool {
    true
}

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory where the note store, auth bundle and templates live
    pub data_dir: PathBuf,

    /// Key namespace for the versioned note store record
    #[serde(default = "default_namespace")]
    pub store_namespace: String,

    /// Store format version; bumped on incompatible schema changes
    #[serde(default = "default_store_version")]
    pub store_version: u32,

    /// Quiet period before an autosave flush, in milliseconds
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    /// Base URL of the Notion API
    #[serde(default = "default_api_base")]
    pub notion_api_base: String,

    /// Title of the Notion database notes are mirrored into
    #[serde(default = "default_database_title")]
    pub database_title: String,

    /// Whether saving the current note also triggers a sync pass when online
    #[serde(default = "default_sync_on_save")]
    pub sync_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notesync");

        Self {
            data_dir,
            store_namespace: default_namespace(),
            store_version: default_store_version(),
            autosave_delay_ms: default_autosave_delay_ms(),
            notion_api_base: default_api_base(),
            database_title: default_database_title(),
            sync_on_save: default_sync_on_save(),
        }
    }
}

impl Config {
    /// Loads the configuration from the platform config dir, falling back to
    /// defaults when the file is absent. A malformed file is an error: unlike
    /// note data, silently discarding user configuration would be surprising.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path();
        Self::load_from(&path)
    }

    /// Loads the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| NsError::ConfigError {
            message: format!("invalid config at {}: {}", path.display(), e),
        })
    }

    /// Ensures the data directory exists.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir).map_err(|e| {
                warn!("Failed to create data dir {}: {}", self.data_dir.display(), e);
                NsError::DirectoryError {
                    path: self.data_dir.clone(),
                }
            })?;
        }
        Ok(())
    }

    fn config_file_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notesync")
            .join("config.json")
    }
}
