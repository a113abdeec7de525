//! One update cycle: check, download, present, install.
//!
//! Everything here runs on a single task. The download future and the event
//! loop are polled together, so feed events are applied strictly in the order
//! the client sent them and no locking is needed.

use futures::StreamExt as _;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{self, Either};

use super::feed::UpdateFeed;
use super::host::{MainWindow, ProgressSurface, Relauncher, VersionSource};
use super::install::{InstallOutcome, InstallTrigger};
use super::machine::{Transition, UpdateStateMachine};
use super::presenter::{deferred_notice, render};
use super::types::{ErrorInfo, FailureKind, FeedEvent, UpdateCommand, UpdateState};

/// Summary of a finished cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub final_state: UpdateState,
    /// The installer handoff succeeded; the process is expected to exit.
    pub relaunched: bool,
}

/// Host-side handle for sending [`UpdateCommand`]s into a running cycle.
#[derive(Debug, Clone)]
pub struct UpdateHandle {
    tx: UnboundedSender<UpdateCommand>,
}

impl UpdateHandle {
    pub fn download(&self) {
        self.send(UpdateCommand::Download);
    }

    pub fn quit(&self) {
        self.send(UpdateCommand::Quit);
    }

    fn send(&self, command: UpdateCommand) {
        if self.tx.unbounded_send(command).is_err() {
            log::debug!("Update cycle already finished, dropping {command:?}");
        }
    }
}

pub fn command_channel() -> (UpdateHandle, UnboundedReceiver<UpdateCommand>) {
    let (tx, rx) = mpsc::unbounded();
    (UpdateHandle { tx }, rx)
}

/// State machine plus the collaborators it drives.
struct Session<S, W, R> {
    machine: UpdateStateMachine,
    surface: S,
    surface_open: bool,
    trigger: InstallTrigger<W, R>,
}

enum Next {
    Event(Option<FeedEvent>),
    Command(Option<UpdateCommand>),
}

impl<S: ProgressSurface, W: MainWindow, R: Relauncher> Session<S, W, R> {
    /// Push the current state to the surface after a change.
    ///
    /// `Idle` and `Checking` are never shown, so a check that finds nothing
    /// never opens a window. `Installing` keeps the restart notice on screen
    /// through the grace period.
    fn present(&mut self, transition: &Transition) {
        if !transition.is_changed() {
            return;
        }
        let text = match self.machine.state() {
            UpdateState::Idle | UpdateState::Checking | UpdateState::Installing => return,
            UpdateState::Downloaded(version) if self.trigger.installs_on_quit() => {
                deferred_notice(version)
            }
            state => render(state, &self.machine.progress()),
        };
        self.surface.show(&text);
        self.surface_open = true;
    }

    fn close_surface(&mut self) {
        if std::mem::take(&mut self.surface_open) {
            self.surface.close();
        }
    }

    fn apply(&mut self, transition: Transition) -> Transition {
        self.present(&transition);
        transition
    }

    fn fail(&mut self, info: ErrorInfo) {
        let transition = self.machine.fail(info);
        self.present(&transition);
    }

    /// Returns `true` once the installer has taken over.
    async fn install(&mut self, artifact: &std::path::Path) -> bool {
        if !self.trigger.installs_on_quit() {
            let transition = self.machine.enter_installing();
            self.present(&transition);
        }

        match self.trigger.install(self.machine.guard_mut(), artifact).await {
            Ok(InstallOutcome::Relaunched) => true,
            Ok(InstallOutcome::AlreadyTriggered | InstallOutcome::DeferredToQuit) => false,
            Err(e) => {
                log::error!("Update install failed: {e}");
                self.fail(ErrorInfo::from(&e));
                false
            }
        }
    }

    /// Application is quitting: run a deferred install if there is one.
    fn quit(&mut self) -> bool {
        if !self.trigger.has_deferred() {
            self.close_surface();
            return false;
        }
        let transition = self.machine.enter_installing();
        self.present(&transition);
        match self.trigger.finish_on_quit() {
            Ok(handed_off) => handed_off,
            Err(e) => {
                log::error!("Update install on quit failed: {e}");
                self.fail(ErrorInfo::from(&e));
                false
            }
        }
    }

    async fn drive(
        &mut self,
        mut events: UnboundedReceiver<FeedEvent>,
        commands: &mut UnboundedReceiver<UpdateCommand>,
    ) -> bool {
        let mut events_open = true;
        let mut commands_open = true;

        loop {
            if !events_open {
                if !self.trigger.has_deferred() {
                    return false;
                }
                if !commands_open {
                    return self.quit();
                }
            }

            let next = match (events_open, commands_open) {
                (true, true) => futures::select! {
                    event = events.next() => Next::Event(event),
                    command = commands.next() => Next::Command(command),
                },
                (true, false) => Next::Event(events.next().await),
                _ => Next::Command(commands.next().await),
            };

            match next {
                Next::Event(Some(event)) => {
                    let transition = self.machine.on_feed_event(event);
                    let transition = self.apply(transition);
                    if let Transition::ReadyToInstall { artifact, .. } = transition
                        && self.install(&artifact).await
                    {
                        return true;
                    }
                }
                Next::Event(None) => {
                    events_open = false;
                    if matches!(self.machine.state(), UpdateState::Downloaded(_))
                        && self.machine.artifact().is_none()
                    {
                        log::error!("Download session ended without a staged file");
                        self.fail(ErrorInfo::new(
                            FailureKind::ArtifactIntegrity,
                            "download finished without a staged file",
                        ));
                    }
                }
                Next::Command(Some(UpdateCommand::Quit)) => return self.quit(),
                Next::Command(Some(UpdateCommand::Download)) => {
                    log::debug!("Download already in progress");
                }
                Next::Command(None) => commands_open = false,
            }
        }
    }
}

pub struct UpdateCycle<F, V, S, W, R> {
    feed: F,
    version: V,
    auto_download: bool,
    session: Session<S, W, R>,
}

impl<F, V, S, W, R> UpdateCycle<F, V, S, W, R>
where
    F: UpdateFeed,
    V: VersionSource,
    S: ProgressSurface,
    W: MainWindow,
    R: Relauncher,
{
    pub fn new(
        feed: F,
        version: V,
        surface: S,
        trigger: InstallTrigger<W, R>,
        auto_download: bool,
    ) -> Self {
        Self {
            feed,
            version,
            auto_download,
            session: Session {
                machine: UpdateStateMachine::new(),
                surface,
                surface_open: false,
                trigger,
            },
        }
    }

    pub fn state(&self) -> &UpdateState {
        self.session.machine.state()
    }

    pub fn machine(&self) -> &UpdateStateMachine {
        &self.session.machine
    }

    pub fn surface(&self) -> &S {
        &self.session.surface
    }

    pub fn trigger(&self) -> &InstallTrigger<W, R> {
        &self.session.trigger
    }

    fn report(&self, relaunched: bool) -> CycleReport {
        CycleReport { final_state: self.state().clone(), relaunched }
    }

    /// Run one update cycle to completion.
    ///
    /// Returns when the feed has nothing new, the cycle failed, the installer
    /// took over, or the host sent [`UpdateCommand::Quit`].
    pub async fn start_update_cycle(
        &mut self,
        mut commands: UnboundedReceiver<UpdateCommand>,
    ) -> CycleReport {
        let Self { feed, version, auto_download, session } = &mut *self;

        let transition = session.machine.begin_check();
        if !session.apply(transition).is_changed() {
            log::warn!("Update cycle already running");
            return self.report(false);
        }

        let current_version = version.current_version();
        let result = match feed.check_for_update(&current_version).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Update check failed: {e}");
                session.fail(ErrorInfo::from(&e));
                return self.report(false);
            }
        };

        let transition = session.machine.on_check_result(&result, *auto_download);
        session.apply(transition);
        if !result.has_update {
            return self.report(false);
        }
        let Some(asset) = result.asset.clone() else {
            session.fail(ErrorInfo::new(FailureKind::FeedParse, "update has no download"));
            return self.report(false);
        };

        if matches!(session.machine.state(), UpdateState::Available(_)) {
            loop {
                match commands.next().await {
                    Some(UpdateCommand::Download) => {
                        let transition = session.machine.begin_download();
                        session.apply(transition);
                        break;
                    }
                    Some(UpdateCommand::Quit) | None => {
                        session.close_surface();
                        return self.report(false);
                    }
                }
            }
        }

        // If the driver finishes first (relaunch or quit) the download is dropped,
        // which deletes its partial file.
        let relaunched = {
            let (tx, rx) = mpsc::unbounded();
            let download = feed.download(&asset, tx);
            let drive = session.drive(rx, &mut commands);
            futures::pin_mut!(download, drive);
            match future::select(download, drive).await {
                Either::Left(((), drive)) => drive.await,
                Either::Right((relaunched, _download)) => relaunched,
            }
        };
        self.report(relaunched)
    }
}
