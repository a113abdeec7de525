#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use chat_ebhc::shell::{ChatView, ShellBridge, ShellWindows, UpdaterThread};
use chat_ebhc::state::{AppSettings, ConfigManager};
use chat_ebhc::updater::PersistedVersion;
use futures::StreamExt as _;
use gpui::*;
use gpui_component::Root;

fn main() {
    env_logger::init();

    #[cfg(target_os = "linux")]
    if let Err(e) = gtk::init() {
        log::error!("Failed to initialize GTK: {e}");
        return;
    }

    let config = match ConfigManager::new() {
        Ok(config) => Some(config),
        Err(e) => {
            log::error!("Config directory unavailable: {e:#}");
            None
        }
    };
    let settings = match config.as_ref().map(ConfigManager::load_settings) {
        Some(Ok(settings)) => settings,
        Some(Err(e)) => {
            log::warn!("Failed to load settings, using defaults: {e:#}");
            AppSettings::default()
        }
        None => AppSettings::default(),
    }
    .with_env_overrides();

    let (bridge, mut shell_commands) = ShellBridge::channel();
    let updater = match config {
        Some(config) if settings.shell.updates_enabled => {
            let version = PersistedVersion::new(config);
            if let Err(e) = version.record_running() {
                log::warn!("Failed to record running version: {e:#}");
            }
            match UpdaterThread::spawn(settings.updater.clone(), version, bridge) {
                Ok(updater) => Some(updater),
                Err(e) => {
                    log::error!("Failed to start updater: {e:#}");
                    None
                }
            }
        }
        _ => {
            log::info!("Updates disabled");
            None
        }
    };

    Application::new().run(move |cx: &mut App| {
        gpui_component::init(cx);

        let shell = settings.shell.clone();
        let bounds = Bounds::centered(
            None,
            size(px(shell.window_width as f32), px(shell.window_height as f32)),
            cx,
        );

        let main_window = cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                titlebar: Some(TitlebarOptions {
                    title: Some("Chat EBHC".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            |window, cx| {
                window.on_window_should_close(cx, move |_window, cx| {
                    if let Some(updater) = &updater {
                        updater.shutdown();
                    }
                    cx.quit();
                    true
                });

                let chat = cx.new(|cx| ChatView::new(&shell.chat_url, window, cx));
                cx.new(|cx| Root::new(chat, window, cx))
            },
        );
        let main_window = match main_window {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to open main window: {e}");
                cx.quit();
                return;
            }
        };

        let mut windows = ShellWindows::new(main_window);
        cx.spawn(async move |cx: &mut AsyncApp| {
            while let Some(command) = shell_commands.next().await {
                if cx.update(|cx| windows.apply(command, cx)).is_err() {
                    break;
                }
            }
        })
        .detach();
    });
}
