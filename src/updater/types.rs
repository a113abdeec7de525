use std::fmt;
use std::path::PathBuf;

use crate::error::Error;

/// Outcome of asking the feed whether a newer release exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResult {
    pub current_version: String,
    pub available_version: Option<String>,
    pub has_update: bool,
    /// Platform artifact for `available_version`, present when `has_update`.
    pub asset: Option<ReleaseAsset>,
}

impl UpdateCheckResult {
    pub fn up_to_date(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            available_version: None,
            has_update: false,
            asset: None,
        }
    }

    pub fn newer(current_version: impl Into<String>, asset: ReleaseAsset) -> Self {
        Self {
            current_version: current_version.into(),
            available_version: Some(asset.version.clone()),
            has_update: true,
            asset: Some(asset),
        }
    }
}

/// A downloadable release artifact resolved for the running platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub version: String,
    pub download_url: String,
    /// Expected size in bytes, `0` when the feed does not say.
    pub file_size: u64,
    /// Lowercase hex SHA-256 of the artifact.
    pub sha256: Option<String>,
    pub file_name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DownloadProgress {
    pub bytes_transferred: u64,
    pub bytes_total: u64,
    pub percent: f64,
}

impl DownloadProgress {
    pub fn new(bytes_transferred: u64, bytes_total: u64) -> Self {
        let percent = if bytes_total > 0 {
            (bytes_transferred as f64 / bytes_total as f64) * 100.0
        } else {
            0.0
        };
        Self { bytes_transferred, bytes_total, percent: percent.clamp(0.0, 100.0) }
    }

    pub fn at_percent(percent: f64) -> Self {
        Self { bytes_transferred: 0, bytes_total: 0, percent }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    FeedParse,
    ArtifactIntegrity,
    InstallHandoff,
    Staging,
}

/// Failure payload carried by [`UpdateState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: FailureKind,
    pub reason: String,
}

impl ErrorInfo {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::Network(_) | Error::Timeout => FailureKind::Network,
            Error::FeedParse(_) | Error::Json(_) => FailureKind::FeedParse,
            Error::ArtifactIntegrity(_) => FailureKind::ArtifactIntegrity,
            Error::InstallHandoff(_) => FailureKind::InstallHandoff,
            Error::Io(_) => FailureKind::Staging,
        };
        Self { kind, reason: err.to_string() }
    }
}

impl From<Error> for ErrorInfo {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum UpdateState {
    #[default]
    Idle,
    Checking,
    /// A newer release exists but automatic download is off.
    Available(String),
    Downloading(DownloadProgress),
    Downloaded(String),
    Installing,
    Failed(ErrorInfo),
}

impl UpdateState {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateState::Idle => "idle",
            UpdateState::Checking => "checking",
            UpdateState::Available(_) => "available",
            UpdateState::Downloading(_) => "downloading",
            UpdateState::Downloaded(_) => "downloaded",
            UpdateState::Installing => "installing",
            UpdateState::Failed(_) => "failed",
        }
    }
}

/// Events streamed by the feed client during one download session.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Started { version: String, artifact: PathBuf, total: u64 },
    Progress(DownloadProgress),
    Completed { version: String, artifact: PathBuf },
    Failed(ErrorInfo),
}

/// Requests from the host application into a running update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCommand {
    /// Start the download of an `Available` release.
    Download,
    /// The application is quitting.
    Quit,
}
