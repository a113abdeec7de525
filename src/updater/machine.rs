//! Update lifecycle state machine.
//!
//! The download can be declared finished by two independent signals: an
//! explicit [`FeedEvent::Completed`] and a progress tick reaching 100%. Either
//! may arrive first, and either may be missing. The first one moves the machine
//! to [`UpdateState::Downloaded`]; anything arriving later is a no-op.

use std::path::{Path, PathBuf};

use super::install::InstallationGuard;
use super::tracker::DownloadTracker;
use super::types::{DownloadProgress, ErrorInfo, FeedEvent, UpdateCheckResult, UpdateState};

/// What a call did to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Unchanged,
    Changed,
    /// The artifact is staged and the install trigger must run.
    ReadyToInstall { version: String, artifact: PathBuf },
}

impl Transition {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Transition::Unchanged)
    }
}

#[derive(Debug, Default)]
pub struct UpdateStateMachine {
    state: UpdateState,
    tracker: DownloadTracker,
    guard: InstallationGuard,
    target_version: Option<String>,
    artifact: Option<PathBuf>,
    /// Set once the install effect has been handed out for this cycle.
    install_requested: bool,
}

impl UpdateStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    pub fn progress(&self) -> DownloadProgress {
        self.tracker.current()
    }

    pub fn guard(&self) -> &InstallationGuard {
        &self.guard
    }

    pub fn guard_mut(&mut self) -> &mut InstallationGuard {
        &mut self.guard
    }

    pub fn target_version(&self) -> Option<&str> {
        self.target_version.as_deref()
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// `Idle|Failed -> Checking`.
    pub fn begin_check(&mut self) -> Transition {
        match self.state {
            UpdateState::Idle | UpdateState::Failed(_) => {
                self.target_version = None;
                self.artifact = None;
                self.install_requested = false;
                self.tracker.reset(0);
                self.set(UpdateState::Checking)
            }
            _ => self.ignore("check"),
        }
    }

    pub fn on_check_result(
        &mut self,
        result: &UpdateCheckResult,
        auto_download: bool,
    ) -> Transition {
        if self.state != UpdateState::Checking {
            return self.ignore("check result");
        }

        let Some(version) = result.available_version.clone().filter(|_| result.has_update) else {
            log::info!("No update available (running {})", result.current_version);
            return self.set(UpdateState::Idle);
        };

        log::info!("Update found: {} -> {version}", result.current_version);
        self.target_version = Some(version.clone());
        if auto_download {
            let total = result.asset.as_ref().map_or(0, |asset| asset.file_size);
            self.tracker.reset(total);
            self.set(UpdateState::Downloading(self.tracker.current()))
        } else {
            self.set(UpdateState::Available(version))
        }
    }

    /// `Available -> Downloading(0%)`, after the user accepted the download.
    pub fn begin_download(&mut self) -> Transition {
        match self.state {
            UpdateState::Available(_) => {
                self.tracker.reset(0);
                self.set(UpdateState::Downloading(self.tracker.current()))
            }
            _ => self.ignore("download request"),
        }
    }

    pub fn on_feed_event(&mut self, event: FeedEvent) -> Transition {
        match event {
            FeedEvent::Started { version, artifact, total } => {
                if !matches!(self.state, UpdateState::Downloading(_)) {
                    return self.ignore("download start");
                }
                self.target_version = Some(version);
                self.artifact = Some(artifact);
                self.tracker.reset(total);
                self.set(UpdateState::Downloading(self.tracker.current()))
            }
            FeedEvent::Progress(tick) => match self.state {
                UpdateState::Downloading(previous) => {
                    let snapshot = self.tracker.on_progress(tick);
                    if snapshot.is_complete() {
                        self.mark_downloaded()
                    } else if snapshot == previous {
                        Transition::Unchanged
                    } else {
                        self.set(UpdateState::Downloading(snapshot))
                    }
                }
                _ => self.ignore("progress tick"),
            },
            FeedEvent::Completed { version, artifact } => match self.state {
                UpdateState::Downloading(_) => {
                    self.target_version = Some(version);
                    self.artifact = Some(artifact);
                    self.mark_downloaded()
                }
                // 100% arrived before we knew where the artifact was staged.
                UpdateState::Downloaded(_) if self.artifact.is_none() => {
                    self.artifact = Some(artifact);
                    self.request_install()
                }
                _ => self.ignore("completion"),
            },
            FeedEvent::Failed(info) => self.fail(info),
        }
    }

    /// Move into `Failed` from any in-flight state of the cycle.
    pub fn fail(&mut self, info: ErrorInfo) -> Transition {
        match self.state {
            UpdateState::Checking
            | UpdateState::Available(_)
            | UpdateState::Downloading(_)
            | UpdateState::Downloaded(_)
            | UpdateState::Installing => {
                log::error!("Update failed during {}: {}", self.state.label(), info.reason);
                self.set(UpdateState::Failed(info))
            }
            UpdateState::Idle | UpdateState::Failed(_) => self.ignore("failure"),
        }
    }

    /// `Downloaded -> Installing`, the only way into `Installing`.
    pub fn enter_installing(&mut self) -> Transition {
        match self.state {
            UpdateState::Downloaded(_) => self.set(UpdateState::Installing),
            _ => self.ignore("install"),
        }
    }

    fn mark_downloaded(&mut self) -> Transition {
        let version = self.target_version.clone().unwrap_or_default();
        log::info!("Update {version} downloaded");
        self.state = UpdateState::Downloaded(version);
        if self.artifact.is_none() {
            log::warn!("Download reached 100% before the artifact location was reported");
            return Transition::Changed;
        }
        self.request_install()
    }

    fn request_install(&mut self) -> Transition {
        if self.install_requested || self.guard.is_triggered() {
            return Transition::Changed;
        }
        match (&self.target_version, &self.artifact) {
            (Some(version), Some(artifact)) => {
                self.install_requested = true;
                Transition::ReadyToInstall { version: version.clone(), artifact: artifact.clone() }
            }
            _ => Transition::Changed,
        }
    }

    fn set(&mut self, state: UpdateState) -> Transition {
        log::debug!("Update state: {} -> {}", self.state.label(), state.label());
        self.state = state;
        Transition::Changed
    }

    fn ignore(&self, what: &str) -> Transition {
        log::debug!("Ignoring {what} while {}", self.state.label());
        Transition::Unchanged
    }
}
