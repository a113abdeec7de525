//! Update progress window and the UI-thread side of [`ShellCommand`]s.

use gpui::*;
use gpui_component::Root;

use crate::updater::DisplayText;

use super::ShellCommand;

pub struct ProgressView {
    text: DisplayText,
}

impl ProgressView {
    pub fn new(text: DisplayText) -> Self {
        Self { text }
    }

    pub fn set_text(&mut self, text: DisplayText, cx: &mut Context<Self>) {
        if self.text != text {
            self.text = text;
            cx.notify();
        }
    }
}

impl Render for ProgressView {
    fn render(&mut self, _window: &mut Window, _cx: &mut Context<Self>) -> impl IntoElement {
        div()
            .size_full()
            .flex()
            .flex_col()
            .justify_center()
            .items_center()
            .gap_2()
            .p_4()
            .child(div().text_sm().child(self.text.status.clone()))
            .child(div().text_xl().child(self.text.percent.clone()))
    }
}

struct ProgressWindow {
    handle: WindowHandle<Root>,
    view: Entity<ProgressView>,
}

/// Windows owned by the shell, mutated only on the GPUI thread.
pub struct ShellWindows {
    main: WindowHandle<Root>,
    progress: Option<ProgressWindow>,
}

impl ShellWindows {
    pub fn new(main: WindowHandle<Root>) -> Self {
        Self { main, progress: None }
    }

    pub fn apply(&mut self, command: ShellCommand, cx: &mut App) {
        match command {
            ShellCommand::ShowProgress(text) => self.show_progress(text, cx),
            ShellCommand::CloseProgress => {
                if let Some(progress) = self.progress.take() {
                    let _ = progress.handle.update(cx, |_, window, _| window.remove_window());
                }
            }
            ShellCommand::CloseMainWindow => {
                log::info!("Closing main window for update");
                let _ = self.main.update(cx, |_, window, _| window.remove_window());
            }
            ShellCommand::HideMainWindow => {
                let _ = self.main.update(cx, |_, window, _| window.minimize_window());
            }
            ShellCommand::ShowMainWindow => {
                log::info!("Restoring main window after failed update handoff");
                let _ = self.main.update(cx, |_, window, _| window.activate_window());
            }
            ShellCommand::Quit => cx.quit(),
        }
    }

    fn show_progress(&mut self, text: DisplayText, cx: &mut App) {
        if let Some(progress) = &self.progress {
            progress.view.update(cx, |view, cx| view.set_text(text, cx));
            return;
        }

        let bounds = Bounds::centered(None, size(px(420.0), px(160.0)), cx);
        let mut created = None;
        let opened = cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                titlebar: Some(TitlebarOptions {
                    title: Some("Chat EBHC Update".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            |window, cx| {
                let view = cx.new(|_| ProgressView::new(text));
                created = Some(view.clone());
                cx.new(|cx| Root::new(view, window, cx))
            },
        );

        match (opened, created) {
            (Ok(handle), Some(view)) => self.progress = Some(ProgressWindow { handle, view }),
            (Err(e), _) => log::error!("Failed to open update window: {e}"),
            (Ok(_), None) => log::error!("Update window opened without a view"),
        }
    }
}
