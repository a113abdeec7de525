//! Text shown in the update progress window.

use super::types::{DownloadProgress, UpdateState};

/// Contents of the two labels of the progress window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayText {
    pub status: String,
    pub percent: String,
}

impl DisplayText {
    fn new(status: impl Into<String>, percent: impl Into<String>) -> Self {
        Self { status: status.into(), percent: percent.into() }
    }
}

/// Project the update state into display text.
///
/// `progress` is the tracker snapshot; it is only read while downloading.
pub fn render(state: &UpdateState, progress: &DownloadProgress) -> DisplayText {
    match state {
        UpdateState::Idle => DisplayText::new("Chat EBHC is up to date.", "\u{2014}"),
        UpdateState::Checking => DisplayText::new("Checking for updates\u{2026}", "\u{2026}"),
        UpdateState::Available(version) => {
            DisplayText::new(format!("Version {version} is available."), "Ready to download")
        }
        UpdateState::Downloading(_) => {
            let status = if progress.bytes_total > 0 {
                format!(
                    "Downloading update\u{2026} {} of {}",
                    format_megabytes(progress.bytes_transferred),
                    format_megabytes(progress.bytes_total)
                )
            } else {
                "Downloading update\u{2026}".to_string()
            };
            DisplayText::new(status, format_percent(progress.percent))
        }
        UpdateState::Downloaded(version) => DisplayText::new(
            format!("Version {version} downloaded. Restarting to install\u{2026}"),
            "100%",
        ),
        UpdateState::Installing => DisplayText::new("Installing update\u{2026}", "100%"),
        UpdateState::Failed(info) => DisplayText::new(format!("Update failed: {info}"), "Error"),
    }
}

/// Shown instead of the restart notice when the install waits for quit.
pub fn deferred_notice(version: &str) -> DisplayText {
    DisplayText::new(
        format!("Version {version} downloaded. It will be installed when you quit."),
        "100%",
    )
}

fn format_percent(percent: f64) -> String {
    format!("{:.0}%", percent.clamp(0.0, 100.0).floor())
}

fn format_megabytes(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes < 1024 * 1024 {
        format!("{} KB", bytes.div_ceil(1024))
    } else {
        format!("{:.1} MB", bytes as f64 / MB)
    }
}
