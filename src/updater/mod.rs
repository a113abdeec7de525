//! Self-update pipeline: feed client, progress tracking, lifecycle state
//! machine, progress text and the installer handoff.

pub mod cycle;
pub mod feed;
pub mod host;
pub mod install;
pub mod machine;
pub mod presenter;
pub mod relaunch;
pub mod tracker;
pub mod types;

pub use cycle::{CycleReport, UpdateCycle, UpdateHandle, command_channel};
pub use feed::{FeedManifest, HttpFeedClient, UpdateFeed};
pub use host::{
    MainWindow, PackageVersion, PersistedVersion, ProgressSurface, Relauncher, VersionSource,
};
pub use install::{InstallOutcome, InstallTrigger, InstallationGuard};
pub use machine::{Transition, UpdateStateMachine};
pub use presenter::{DisplayText, render};
pub use relaunch::ProcessRelauncher;
pub use tracker::DownloadTracker;
pub use types::{
    DownloadProgress, ErrorInfo, FailureKind, FeedEvent, ReleaseAsset, UpdateCheckResult,
    UpdateCommand, UpdateState,
};
