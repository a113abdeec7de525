//! Shared fakes for the update cycle integration tests.
//!
//! Window, surface and relauncher all append to one [`Journal`] so tests can
//! assert on the order of UI effects.

#![allow(dead_code)]

pub mod feed_server;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;
use tempfile::TempDir;

use chat_ebhc::error::{Error, Result};
use chat_ebhc::updater::{
    DisplayText, DownloadProgress, FeedEvent, InstallTrigger, MainWindow, ProgressSurface,
    ReleaseAsset, Relauncher, UpdateCheckResult, UpdateCycle, UpdateFeed, VersionSource,
};

pub const CURRENT: &str = "2.0.3";
pub const NEXT: &str = "2.1.0";

#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e.starts_with(prefix))
    }
}

pub struct RecordingWindow(pub Journal);

impl MainWindow for RecordingWindow {
    fn close(&mut self) {
        self.0.push("window:close");
    }

    fn hide(&mut self) {
        self.0.push("window:hide");
    }

    fn show(&mut self) {
        self.0.push("window:show");
    }
}

pub struct RecordingSurface {
    journal: Journal,
    shown: Vec<DisplayText>,
}

impl RecordingSurface {
    pub fn new(journal: Journal) -> Self {
        Self { journal, shown: Vec::new() }
    }

    pub fn shown(&self) -> &[DisplayText] {
        &self.shown
    }

    pub fn last(&self) -> Option<&DisplayText> {
        self.shown.last()
    }
}

impl ProgressSurface for RecordingSurface {
    fn show(&mut self, text: &DisplayText) {
        self.journal.push(format!("show:{} [{}]", text.status, text.percent));
        self.shown.push(text.clone());
    }

    fn close(&mut self) {
        self.journal.push("surface:close");
    }
}

pub struct RecordingRelauncher {
    journal: Journal,
    fail: bool,
}

impl Relauncher for RecordingRelauncher {
    fn relaunch_with_artifact(&mut self, artifact: &Path) -> Result<()> {
        if self.fail {
            return Err(Error::InstallHandoff("installer refused to start".to_string()));
        }
        let name = artifact.file_name().map(|n| n.to_string_lossy().into_owned());
        self.journal.push(format!("relaunch:{}", name.unwrap_or_default()));
        Ok(())
    }
}

pub struct FixedVersion(pub &'static str);

impl VersionSource for FixedVersion {
    fn current_version(&self) -> String {
        self.0.to_string()
    }
}

/// What [`ScriptedFeed::check_for_update`] answers.
pub enum CheckScript {
    UpToDate,
    Newer,
    Fail(fn() -> Error),
}

/// Feed that replays a fixed list of events instead of downloading.
pub struct ScriptedFeed {
    pub check: CheckScript,
    pub events: Vec<FeedEvent>,
    /// Keep the session open after the last event until the cycle drops it.
    pub stall: bool,
    pub asset_size: u64,
}

impl ScriptedFeed {
    pub fn up_to_date() -> Self {
        Self::with_events(CheckScript::UpToDate, Vec::new())
    }

    pub fn newer(events: Vec<FeedEvent>) -> Self {
        Self::with_events(CheckScript::Newer, events)
    }

    pub fn failing_check(err: fn() -> Error) -> Self {
        Self::with_events(CheckScript::Fail(err), Vec::new())
    }

    fn with_events(check: CheckScript, events: Vec<FeedEvent>) -> Self {
        Self { check, events, stall: false, asset_size: 4096 }
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }
}

pub fn asset(version: &str, size: u64) -> ReleaseAsset {
    ReleaseAsset {
        version: version.to_string(),
        download_url: format!("https://updates.test/ChatEBHC-Setup-{version}.exe"),
        file_size: size,
        sha256: None,
        file_name: format!("ChatEBHC-Setup-{version}.exe"),
        notes: None,
    }
}

impl UpdateFeed for ScriptedFeed {
    async fn check_for_update(&self, current_version: &str) -> Result<UpdateCheckResult> {
        match &self.check {
            CheckScript::UpToDate => Ok(UpdateCheckResult::up_to_date(current_version)),
            CheckScript::Newer => {
                Ok(UpdateCheckResult::newer(current_version, asset(NEXT, self.asset_size)))
            }
            CheckScript::Fail(err) => Err(err()),
        }
    }

    async fn download(&self, _asset: &ReleaseAsset, events: UnboundedSender<FeedEvent>) {
        for event in &self.events {
            let _ = events.unbounded_send(event.clone());
            tokio::task::yield_now().await;
        }
        if self.stall {
            futures::future::pending::<()>().await;
        }
    }
}

/// A staged artifact on disk, as the feed client would leave it.
pub struct StagedArtifact {
    _dir: TempDir,
    pub path: PathBuf,
}

impl StagedArtifact {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(format!("ChatEBHC-Setup-{NEXT}.exe"));
        std::fs::write(&path, b"installer bytes").expect("write artifact");
        Self { _dir: dir, path }
    }

    pub fn started(&self, total: u64) -> FeedEvent {
        FeedEvent::Started { version: NEXT.to_string(), artifact: self.path.clone(), total }
    }

    pub fn completed(&self) -> FeedEvent {
        FeedEvent::Completed { version: NEXT.to_string(), artifact: self.path.clone() }
    }
}

pub fn progress(transferred: u64, total: u64) -> FeedEvent {
    FeedEvent::Progress(DownloadProgress::new(transferred, total))
}

pub type TestCycle<F> =
    UpdateCycle<F, FixedVersion, RecordingSurface, RecordingWindow, RecordingRelauncher>;

pub struct CycleOptions {
    pub auto_download: bool,
    pub install_on_quit: bool,
    pub relauncher_fails: bool,
    pub grace: Duration,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            auto_download: true,
            install_on_quit: false,
            relauncher_fails: false,
            grace: Duration::ZERO,
        }
    }
}

pub fn new_cycle<F: UpdateFeed>(feed: F, options: CycleOptions) -> (TestCycle<F>, Journal) {
    let journal = Journal::default();
    let trigger = InstallTrigger::new(
        RecordingWindow(journal.clone()),
        RecordingRelauncher { journal: journal.clone(), fail: options.relauncher_fails },
        options.grace,
        options.install_on_quit,
    );
    let cycle = UpdateCycle::new(
        feed,
        FixedVersion(CURRENT),
        RecordingSurface::new(journal.clone()),
        trigger,
        options.auto_download,
    );
    (cycle, journal)
}
