//! Local axum server standing in for the update CDN.
//!
//! Each route is an exact request path; anything else is a 404.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub enum Route {
    Reply { status: u16, body: Vec<u8> },
    /// Accept the request and sit on it well past any client timeout.
    Stall,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Route::Reply { status: 200, body: body.into() }
    }

    pub fn status(status: u16) -> Self {
        Route::Reply { status, body: Vec::new() }
    }
}

async fn respond(route: Route) -> Response {
    match route {
        Route::Reply { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, body).into_response()
        }
        Route::Stall => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

pub struct FeedServer {
    addr: SocketAddr,
}

impl FeedServer {
    /// Bind to an ephemeral port and serve `routes` on the current runtime.
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let app = routes.into_iter().fold(Router::new(), |app, (path, route)| {
            app.route(path, get(move || respond(route.clone())))
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind feed server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("feed server stopped: {e}");
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

/// Feed document pointing at `artifact_url`.
pub fn manifest(version: &str, artifact_url: &str, payload: &[u8]) -> String {
    serde_json::json!({
        "version": version,
        "notes": "Bug fixes",
        "url": artifact_url,
        "size": payload.len(),
        "sha256": sha256_hex(payload),
    })
    .to_string()
}
