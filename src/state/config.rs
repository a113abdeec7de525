// Configuration management for persistent state

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::settings::AppSettings;

#[cfg(debug_assertions)]
pub(crate) const APP_NAME: &str = "chat-ebhc-dev";

#[cfg(not(debug_assertions))]
pub(crate) const APP_NAME: &str = "chat-ebhc";

/// Manages persistent configuration files
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    const SETTINGS_FILE: &'static str = "settings.json";
    const VERSION_FILE: &'static str = "version";

    /// Create a new ConfigManager, initializing the config directory if needed
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Self::with_config_dir(config_dir)
    }

    /// Use an explicit directory instead of the platform config dir.
    pub fn with_config_dir(config_dir: PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }
        Ok(Self { config_dir })
    }

    /// Get the platform-specific config directory
    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME)).context("Could not determine config directory")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    fn file_path(&self, filename: &str) -> PathBuf {
        self.config_dir.join(filename)
    }

    /// Load data from a JSON file
    fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);

        if !path.exists() {
            return Ok(None);
        }

        let data =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", filename))?;

        let value: T = serde_json::from_str(&data)
            .with_context(|| format!("Failed to deserialize {}", filename))?;

        Ok(Some(value))
    }

    /// Save data to a JSON file (atomic via temp + rename).
    fn save_json<T: Serialize + ?Sized>(&self, filename: &str, data: &T) -> Result<()> {
        let path = self.file_path(filename);

        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Failed to serialize {}", filename))?;

        atomic_write(&path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", filename))?;

        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Load application settings from disk, defaults when the file is missing
    pub fn load_settings(&self) -> Result<AppSettings> {
        Ok(self.load_json(Self::SETTINGS_FILE)?.unwrap_or_default())
    }

    /// Save application settings to disk
    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        self.save_json(Self::SETTINGS_FILE, settings)
    }

    // =========================================================================
    // Installed version marker
    // =========================================================================

    /// Version recorded by the last successful launch, if any.
    pub fn load_installed_version(&self) -> Result<Option<String>> {
        let path = self.file_path(Self::VERSION_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", Self::VERSION_FILE))?;
        let version = raw.trim();
        Ok((!version.is_empty()).then(|| version.to_string()))
    }

    pub fn save_installed_version(&self, version: &str) -> Result<()> {
        atomic_write(&self.file_path(Self::VERSION_FILE), version.as_bytes())
            .with_context(|| format!("Failed to write {}", Self::VERSION_FILE))
    }
}

/// Write `data` to `path` atomically: write to a sibling temp file first, then
/// rename. Readers see either the old or the new content, never a partial write.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(path);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
