//! GPUI window layer: the chat window, the update progress window, and the
//! bridge between them and the update cycle thread.

pub mod chat;
pub mod progress;

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::state::settings::UpdaterSettings;
use crate::updater::{
    DisplayText, HttpFeedClient, InstallTrigger, MainWindow, PersistedVersion, ProcessRelauncher,
    ProgressSurface, UpdateCycle, UpdateHandle, command_channel,
};

pub use chat::ChatView;
pub use progress::{ProgressView, ShellWindows};

/// UI effects requested by the update thread, applied on the GPUI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    ShowProgress(DisplayText),
    CloseProgress,
    CloseMainWindow,
    HideMainWindow,
    ShowMainWindow,
    Quit,
}

/// Implements the update core's host traits by forwarding to the UI thread.
#[derive(Debug, Clone)]
pub struct ShellBridge {
    tx: UnboundedSender<ShellCommand>,
}

impl ShellBridge {
    pub fn channel() -> (Self, UnboundedReceiver<ShellCommand>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, command: ShellCommand) {
        if self.tx.unbounded_send(command).is_err() {
            log::debug!("UI is gone, dropping shell command");
        }
    }
}

impl MainWindow for ShellBridge {
    fn close(&mut self) {
        self.send(ShellCommand::CloseMainWindow);
    }

    fn hide(&mut self) {
        self.send(ShellCommand::HideMainWindow);
    }

    fn show(&mut self) {
        self.send(ShellCommand::ShowMainWindow);
    }
}

impl ProgressSurface for ShellBridge {
    fn show(&mut self, text: &DisplayText) {
        self.send(ShellCommand::ShowProgress(text.clone()));
    }

    fn close(&mut self) {
        self.send(ShellCommand::CloseProgress);
    }
}

/// Update cycle running on its own thread with a current-thread Tokio runtime.
pub struct UpdaterThread {
    handle: UpdateHandle,
    done: std_mpsc::Receiver<()>,
    quit_wait: Duration,
    install_on_quit: bool,
}

impl UpdaterThread {
    pub fn spawn(
        settings: UpdaterSettings,
        version: PersistedVersion,
        bridge: ShellBridge,
    ) -> anyhow::Result<Self> {
        let (handle, commands) = command_channel();
        let (done_tx, done) = std_mpsc::channel();
        let quit_wait = settings.quit_wait();
        let install_on_quit = settings.auto_install_on_quit;

        thread::Builder::new().name("updater".to_string()).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Could not start updater runtime: {e}");
                    return;
                }
            };

            runtime.block_on(async move {
                let feed = match HttpFeedClient::new(&settings) {
                    Ok(feed) => feed,
                    Err(e) => {
                        log::error!("Could not create update client: {e}");
                        return;
                    }
                };
                let relauncher = ProcessRelauncher::with_exit_hook({
                    let bridge = bridge.clone();
                    move || bridge.send(ShellCommand::Quit)
                });
                let trigger = InstallTrigger::new(
                    bridge.clone(),
                    relauncher,
                    settings.grace_period(),
                    settings.auto_install_on_quit,
                );
                let mut cycle =
                    UpdateCycle::new(feed, version, bridge, trigger, settings.auto_download);
                let report = cycle.start_update_cycle(commands).await;
                log::info!(
                    "Update cycle finished: state={}, relaunched={}",
                    report.final_state.label(),
                    report.relaunched
                );
            });
            let _ = done_tx.send(());
        })?;

        Ok(Self { handle, done, quit_wait, install_on_quit })
    }

    pub fn handle(&self) -> &UpdateHandle {
        &self.handle
    }

    /// Tell the cycle the app is quitting and wait for it to wrap up, which
    /// runs an install deferred to quit.
    pub fn shutdown(&self) {
        self.handle.quit();
        if self.done.recv_timeout(self.quit_wait).is_ok() {
            return;
        }
        if self.install_on_quit {
            log::error!(
                "Updater did not finish within {:?}; a pending update install may be abandoned",
                self.quit_wait
            );
        } else {
            log::warn!("Updater did not finish within {:?}", self.quit_wait);
        }
    }
}
