//! Replace-and-relaunch handoff, executed at most once per run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

use super::host::{MainWindow, Relauncher};

/// Latch recording that the install side effect has been claimed.
///
/// Never reset within a run: after a successful handoff the process is gone,
/// and after a failed one we keep running the old version.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InstallationGuard {
    triggered: bool,
}

impl InstallationGuard {
    /// Claim the latch. Returns `false` if it was already claimed.
    pub fn trigger(&mut self) -> bool {
        !std::mem::replace(&mut self.triggered, true)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer took over; the process is on its way out.
    Relaunched,
    /// Someone else already triggered the install. Nothing was done.
    AlreadyTriggered,
    /// Install postponed until the application quits.
    DeferredToQuit,
}

pub struct InstallTrigger<W, R> {
    window: W,
    relauncher: R,
    grace_period: Duration,
    install_on_quit: bool,
    deferred: Option<PathBuf>,
}

impl<W: MainWindow, R: Relauncher> InstallTrigger<W, R> {
    pub fn new(window: W, relauncher: R, grace_period: Duration, install_on_quit: bool) -> Self {
        Self {
            window,
            relauncher,
            grace_period,
            install_on_quit,
            deferred: None,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn relauncher(&self) -> &R {
        &self.relauncher
    }

    pub fn installs_on_quit(&self) -> bool {
        self.install_on_quit
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Run the install for `artifact` unless `guard` says it already ran.
    ///
    /// Order on the immediate path: claim the guard, wait out the grace period,
    /// hide the main window, relaunch, close the window. A failed relaunch
    /// brings the window back.
    pub async fn install(
        &mut self,
        guard: &mut InstallationGuard,
        artifact: &Path,
    ) -> Result<InstallOutcome> {
        if !guard.trigger() {
            log::debug!("Install already triggered, ignoring {}", artifact.display());
            return Ok(InstallOutcome::AlreadyTriggered);
        }

        if self.install_on_quit {
            log::info!("Update staged at {}; installing on quit", artifact.display());
            self.deferred = Some(artifact.to_path_buf());
            return Ok(InstallOutcome::DeferredToQuit);
        }

        if !self.grace_period.is_zero() {
            tokio::time::sleep(self.grace_period).await;
        }
        self.handoff(artifact)?;
        Ok(InstallOutcome::Relaunched)
    }

    /// Complete a deferred install while the application is quitting.
    ///
    /// Returns `Ok(false)` when nothing was deferred.
    pub fn finish_on_quit(&mut self) -> Result<bool> {
        let Some(artifact) = self.deferred.take() else {
            return Ok(false);
        };
        self.handoff(&artifact)?;
        Ok(true)
    }

    fn handoff(&mut self, artifact: &Path) -> Result<()> {
        // Checked before the window goes away so a bad artifact leaves the app usable.
        if !artifact.is_file() {
            return Err(Error::InstallHandoff(format!(
                "update file {} is missing",
                artifact.display()
            )));
        }

        self.window.hide();
        log::info!("Handing off to installer: {}", artifact.display());
        if let Err(e) = self.relauncher.relaunch_with_artifact(artifact) {
            log::error!("Installer handoff failed, restoring main window: {e}");
            self.window.show();
            return Err(e);
        }
        self.window.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    use tempfile::NamedTempFile;

    use super::*;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Window(Journal);

    impl MainWindow for Window {
        fn close(&mut self) {
            self.0.borrow_mut().push("close".to_string());
        }

        fn hide(&mut self) {
            self.0.borrow_mut().push("hide".to_string());
        }

        fn show(&mut self) {
            self.0.borrow_mut().push("show".to_string());
        }
    }

    struct Launcher {
        journal: Journal,
        fail: bool,
    }

    impl Relauncher for Launcher {
        fn relaunch_with_artifact(&mut self, artifact: &Path) -> Result<()> {
            if self.fail {
                return Err(Error::InstallHandoff("refused".to_string()));
            }
            self.journal.borrow_mut().push(format!("relaunch {}", artifact.display()));
            Ok(())
        }
    }

    fn setup(
        grace: Duration,
        on_quit: bool,
        fail: bool,
    ) -> (InstallTrigger<Window, Launcher>, Journal) {
        let journal: Journal = Rc::default();
        let trigger = InstallTrigger::new(
            Window(journal.clone()),
            Launcher { journal: journal.clone(), fail },
            grace,
            on_quit,
        );
        (trigger, journal)
    }

    #[test]
    fn guard_claims_once() {
        let mut guard = InstallationGuard::default();
        assert!(guard.trigger());
        assert!(!guard.trigger());
        assert!(guard.is_triggered());
    }

    #[tokio::test]
    async fn second_install_is_a_silent_no_op() {
        let artifact = NamedTempFile::new().expect("temp file");
        let (mut trigger, journal) = setup(Duration::ZERO, false, false);
        let mut guard = InstallationGuard::default();

        let first = trigger.install(&mut guard, artifact.path()).await.expect("first install");
        let second = trigger.install(&mut guard, artifact.path()).await.expect("second install");

        assert_eq!(first, InstallOutcome::Relaunched);
        assert_eq!(second, InstallOutcome::AlreadyTriggered);
        assert_eq!(journal.borrow().len(), 3);
        assert_eq!(journal.borrow()[0], "hide");
        assert_eq!(journal.borrow()[2], "close");
    }

    #[tokio::test]
    async fn waits_grace_period_before_hiding() {
        let artifact = NamedTempFile::new().expect("temp file");
        let (mut trigger, journal) = setup(Duration::from_millis(40), false, false);
        let mut guard = InstallationGuard::default();

        let started = Instant::now();
        trigger.install(&mut guard, artifact.path()).await.expect("install");

        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(journal.borrow()[0], "hide");
        assert!(journal.borrow()[1].starts_with("relaunch "));
        assert_eq!(journal.borrow()[2], "close");
    }

    #[tokio::test]
    async fn missing_artifact_keeps_window_open() {
        let (mut trigger, journal) = setup(Duration::ZERO, false, false);
        let mut guard = InstallationGuard::default();

        let err = trigger
            .install(&mut guard, Path::new("/definitely/not/here.exe"))
            .await
            .expect_err("missing artifact should fail");

        assert!(matches!(err, Error::InstallHandoff(_)));
        assert!(journal.borrow().is_empty());
        assert!(guard.is_triggered());
    }

    #[tokio::test]
    async fn relauncher_failure_restores_window() {
        let artifact = NamedTempFile::new().expect("temp file");
        let (mut trigger, journal) = setup(Duration::ZERO, false, true);
        let mut guard = InstallationGuard::default();

        let err = trigger.install(&mut guard, artifact.path()).await.expect_err("should fail");
        assert_eq!(err.to_string(), "could not hand off to installer: refused");
        assert_eq!(*journal.borrow(), vec!["hide".to_string(), "show".to_string()]);
    }

    #[tokio::test]
    async fn deferred_install_runs_on_quit_once() {
        let artifact = NamedTempFile::new().expect("temp file");
        let (mut trigger, journal) = setup(Duration::from_secs(60), true, false);
        let mut guard = InstallationGuard::default();

        let outcome = trigger.install(&mut guard, artifact.path()).await.expect("install");
        assert_eq!(outcome, InstallOutcome::DeferredToQuit);
        assert!(journal.borrow().is_empty());
        assert!(trigger.has_deferred());

        assert!(trigger.finish_on_quit().expect("quit install"));
        assert!(!trigger.finish_on_quit().expect("second quit"));
        assert_eq!(journal.borrow().len(), 3);
    }
}
