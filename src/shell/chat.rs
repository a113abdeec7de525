//! Main window content: the hosted chat in an embedded WebView.

use gpui::*;
use gpui_component::webview::WebView;
use gpui_component::wry;

pub struct ChatView {
    webview: Option<Entity<WebView>>,
    load_error: Option<SharedString>,
}

impl ChatView {
    pub fn new(chat_url: &str, window: &mut Window, cx: &mut Context<Self>) -> Self {
        match build_webview(chat_url, window, cx) {
            Ok(webview) => Self { webview: Some(webview), load_error: None },
            Err(e) => {
                log::error!("Failed to create chat WebView: {e:#}");
                Self { webview: None, load_error: Some(format!("{e:#}").into()) }
            }
        }
    }
}

fn build_webview(
    chat_url: &str,
    window: &mut Window,
    cx: &mut Context<ChatView>,
) -> anyhow::Result<Entity<WebView>> {
    log::debug!("Creating chat WebView for {chat_url}");

    let builder = wry::WebViewBuilder::new()
        .with_url(chat_url)
        .with_devtools(cfg!(debug_assertions))
        .with_focused(true)
        .with_accept_first_mouse(true);

    let webview = attach_native(builder, window)?;
    let webview = cx.new(|cx| WebView::new(webview, window, cx));
    webview.update(cx, |wv, _| {
        wv.show();
    });
    Ok(webview)
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
fn attach_native(
    builder: wry::WebViewBuilder<'_>,
    window: &Window,
) -> anyhow::Result<wry::WebView> {
    use raw_window_handle::HasWindowHandle as _;
    let window_handle =
        window.window_handle().map_err(|e| anyhow::anyhow!("no window handle: {e}"))?;
    Ok(builder.build_as_child(&window_handle)?)
}

#[cfg(target_os = "linux")]
fn attach_native(
    builder: wry::WebViewBuilder<'_>,
    _window: &Window,
) -> anyhow::Result<wry::WebView> {
    use gtk::prelude::*;
    use wry::WebViewBuilderExtUnix;
    let fixed = gtk::Fixed::builder().build();
    fixed.show_all();
    Ok(builder.build_gtk(&fixed)?)
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn attach_native(
    _builder: wry::WebViewBuilder<'_>,
    _window: &Window,
) -> anyhow::Result<wry::WebView> {
    anyhow::bail!("embedded chat is not supported on this platform")
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, _cx: &mut Context<Self>) -> impl IntoElement {
        let content = match (&self.webview, &self.load_error) {
            (Some(webview), _) => webview.clone().into_any_element(),
            (None, error) => div()
                .p_4()
                .text_sm()
                .child(format!(
                    "Could not load the chat: {}",
                    error.clone().unwrap_or_else(|| "unknown error".into())
                ))
                .into_any_element(),
        };
        div().size_full().child(content)
    }
}
