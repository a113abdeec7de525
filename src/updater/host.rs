//! Collaborators the update core needs from the host application.

use std::path::Path;

use crate::error::Result;
use crate::state::ConfigManager;

use super::presenter::DisplayText;

/// The chat window. Hidden while the installer starts, closed once it has.
pub trait MainWindow {
    fn close(&mut self);
    fn hide(&mut self);
    fn show(&mut self);
}

/// Minimal modal window with a status label and a percent label.
///
/// Implementations create the window lazily on the first `show`.
pub trait ProgressSurface {
    fn show(&mut self, text: &DisplayText);
    fn close(&mut self);
}

pub trait VersionSource {
    fn current_version(&self) -> String;
}

/// Hands the staged artifact to the platform installer.
///
/// On success the current process is expected to terminate; callers treat
/// everything after a successful call as unreachable.
pub trait Relauncher {
    fn relaunch_with_artifact(&mut self, artifact: &Path) -> Result<()>;
}

/// Version compiled into this binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageVersion;

impl VersionSource for PackageVersion {
    fn current_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

/// Version marker kept in the config dir, falling back to the compiled version.
#[derive(Debug, Clone)]
pub struct PersistedVersion {
    config: ConfigManager,
}

impl PersistedVersion {
    pub fn new(config: ConfigManager) -> Self {
        Self { config }
    }

    /// Record the running version so the next launch can tell an update landed.
    pub fn record_running(&self) -> anyhow::Result<Option<String>> {
        let previous = self.config.load_installed_version()?;
        let running = PackageVersion.current_version();
        if previous.as_deref() != Some(running.as_str()) {
            if let Some(previous) = &previous {
                log::info!("Updated from {previous} to {running}");
            }
            self.config.save_installed_version(&running)?;
        }
        Ok(previous)
    }
}

impl VersionSource for PersistedVersion {
    fn current_version(&self) -> String {
        match self.config.load_installed_version() {
            Ok(Some(version)) => version,
            Ok(None) => PackageVersion.current_version(),
            Err(e) => {
                log::warn!("Could not read installed version: {e:#}");
                PackageVersion.current_version()
            }
        }
    }
}
