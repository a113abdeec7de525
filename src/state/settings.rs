//! Application settings with persistence.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const FEED_URL_ENV: &str = "CHAT_EBHC_FEED_URL";
pub const AUTO_DOWNLOAD_ENV: &str = "CHAT_EBHC_AUTO_DOWNLOAD";
pub const GRACE_MS_ENV: &str = "CHAT_EBHC_GRACE_MS";
pub const CHAT_URL_ENV: &str = "CHAT_EBHC_CHAT_URL";

pub const DEFAULT_FEED_URL: &str = "https://updates.ebhc.com.br/chat/latest.json";
pub const DEFAULT_CHAT_URL: &str = "https://chat.ebhc.com.br/";

/// Subfolder created inside a user-configured staging dir.
pub const STAGING_SUBDIR: &str = "chat-ebhc-updates";

const QUIT_WAIT: Duration = Duration::from_secs(3);
const DEFERRED_INSTALL_WAIT: Duration = Duration::from_secs(30);

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppSettings {
    #[serde(default)]
    pub updater: UpdaterSettings,
    #[serde(default)]
    pub shell: ShellSettings,
}

/// Self-update behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdaterSettings {
    /// Download as soon as a newer release is found, without asking.
    #[serde(default = "default_true")]
    pub auto_download: bool,
    /// Keep the downloaded artifact and install when the app quits instead of
    /// relaunching right away.
    #[serde(default)]
    pub auto_install_on_quit: bool,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u32,
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where artifacts are staged. Falls back to the platform cache dir.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            auto_download: true,
            auto_install_on_quit: false,
            grace_period_ms: default_grace_period_ms(),
            feed_url: default_feed_url(),
            request_timeout_secs: default_request_timeout_secs(),
            staging_dir: None,
        }
    }
}

impl UpdaterSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.grace_period_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Directory owned by the updater. A configured `staging_dir` may be shared
    /// with other files, so artifacts go into a subfolder of it.
    pub fn resolved_staging_dir(&self) -> PathBuf {
        match &self.staging_dir {
            Some(dir) => dir.join(STAGING_SUBDIR),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(super::config::APP_NAME)
                .join("updates"),
        }
    }

    /// How long quitting waits for the update thread. Longer when an install
    /// may be pending, since the handoff runs during quit.
    pub fn quit_wait(&self) -> Duration {
        if self.auto_install_on_quit { DEFERRED_INSTALL_WAIT } else { QUIT_WAIT }
    }
}

/// Window and embedded chat settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellSettings {
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_true")]
    pub updates_enabled: bool,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            updates_enabled: true,
        }
    }
}

impl AppSettings {
    /// Apply `CHAT_EBHC_*` environment overrides on top of the stored values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::with_env_overrides`] with an injectable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(FEED_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.updater.feed_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(AUTO_DOWNLOAD_ENV) {
            match parse_bool(&raw) {
                Some(value) => self.updater.auto_download = value,
                None => log::warn!("Ignoring {AUTO_DOWNLOAD_ENV}={raw}: not a boolean"),
            }
        }
        if let Some(raw) = lookup(GRACE_MS_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(ms) => self.updater.grace_period_ms = ms,
                Err(_) => log::warn!("Ignoring {GRACE_MS_ENV}={raw}: not a number"),
            }
        }
        if let Some(url) = lookup(CHAT_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.shell.chat_url = url.trim().to_string();
        }
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_grace_period_ms() -> u32 {
    1500
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_chat_url() -> String {
    DEFAULT_CHAT_URL.to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (FEED_URL_ENV, " https://example.test/feed.json "),
            (AUTO_DOWNLOAD_ENV, "off"),
            (GRACE_MS_ENV, "250"),
        ]
        .into_iter()
        .collect();

        let settings = AppSettings::default()
            .with_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(settings.updater.feed_url, "https://example.test/feed.json");
        assert!(!settings.updater.auto_download);
        assert_eq!(settings.updater.grace_period_ms, 250);
        assert_eq!(settings.shell.chat_url, DEFAULT_CHAT_URL);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let settings = AppSettings::default().with_overrides(|key| match key {
            AUTO_DOWNLOAD_ENV => Some("maybe".to_string()),
            GRACE_MS_ENV => Some("-5".to_string()),
            FEED_URL_ENV => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_quit_wait_longer_when_installing_on_quit() {
        let immediate = UpdaterSettings::default();
        let on_quit = UpdaterSettings { auto_install_on_quit: true, ..Default::default() };
        assert_eq!(immediate.quit_wait(), QUIT_WAIT);
        assert_eq!(on_quit.quit_wait(), DEFERRED_INSTALL_WAIT);
        assert!(on_quit.quit_wait() > immediate.quit_wait());
    }

    #[test]
    fn test_request_timeout_never_zero() {
        let settings = UpdaterSettings { request_timeout_secs: 0, ..Default::default() };
        assert_eq!(settings.request_timeout(), Duration::from_secs(1));
    }
}
