//! Client for the JSON update feed.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt as _;
use futures::channel::mpsc::UnboundedSender;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::state::settings::UpdaterSettings;

use super::types::{DownloadProgress, ErrorInfo, FeedEvent, ReleaseAsset, UpdateCheckResult};

/// Feed document served at `feed_url`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeedManifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "downloadUrl")]
    pub url: Option<String>,
    #[serde(default, alias = "fileSize")]
    pub size: Option<u64>,
    #[serde(default)]
    pub sha256: Option<String>,
    /// Per-platform artifacts keyed by `<os>-<arch>`, e.g. `windows-x86_64`.
    #[serde(default)]
    pub platforms: HashMap<String, PlatformAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformAsset {
    #[serde(alias = "downloadUrl")]
    pub url: String,
    #[serde(default, alias = "fileSize")]
    pub size: Option<u64>,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Source of update metadata and artifacts.
#[allow(async_fn_in_trait)]
pub trait UpdateFeed {
    async fn check_for_update(&self, current_version: &str) -> Result<UpdateCheckResult>;

    /// Stream `asset` to the staging area, reporting through `events`.
    ///
    /// Every session ends with exactly one `Completed` or `Failed` event.
    async fn download(&self, asset: &ReleaseAsset, events: UnboundedSender<FeedEvent>);
}

/// Platform key used to pick an entry from [`FeedManifest::platforms`].
pub fn platform_key() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Decide whether `manifest` describes a release newer than `current_version`.
pub fn resolve_release(
    manifest: &FeedManifest,
    current_version: &str,
    platform: &str,
) -> Result<Option<ReleaseAsset>> {
    let remote_str = manifest.version.trim();
    let remote_str = remote_str.strip_prefix('v').unwrap_or(remote_str);
    if remote_str.is_empty() {
        return Err(Error::FeedParse("feed has no version".to_string()));
    }
    let remote = semver::Version::parse(remote_str)
        .map_err(|e| Error::FeedParse(format!("bad version {remote_str:?}: {e}")))?;

    let local_str = current_version.trim();
    let local = semver::Version::parse(local_str.strip_prefix('v').unwrap_or(local_str))
        .map_err(|e| Error::FeedParse(format!("bad current version {current_version:?}: {e}")))?;

    if remote <= local {
        return Ok(None);
    }

    let (url, size, sha256) = match manifest.platforms.get(platform) {
        Some(entry) => (Some(entry.url.clone()), entry.size, entry.sha256.clone()),
        None => (manifest.url.clone(), manifest.size, manifest.sha256.clone()),
    };
    let download_url = url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::FeedParse(format!("no download for {platform} in {remote_str}")))?;

    let file_name = artifact_file_name(&download_url, remote_str);
    Ok(Some(ReleaseAsset {
        version: remote_str.to_string(),
        download_url,
        file_size: size.unwrap_or(0),
        sha256: sha256.map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()),
        file_name,
        notes: manifest.notes.clone(),
    }))
}

/// Last path segment of the URL, or a versioned fallback.
fn artifact_file_name(url: &str, version: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .filter(|name| !name.contains('\\'))
        .map(String::from)
        .unwrap_or_else(|| format!("chat-ebhc-{version}-update"))
}

/// Percent shown while bytes are still arriving. Never reaches 100 before the
/// artifact has been verified and moved into place.
fn staged_percent(downloaded: u64, total: u64) -> u8 {
    if total > 0 {
        ((downloaded.saturating_mul(100)) / total).min(99) as u8
    } else {
        // No size known: creep forward, capped at 99
        99u64.min(downloaded / (1024 * 100)) as u8
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct HttpFeedClient {
    client: reqwest::Client,
    feed_url: String,
    staging_dir: PathBuf,
    timeout: Duration,
}

impl HttpFeedClient {
    pub fn new(settings: &UpdaterSettings) -> Result<Self> {
        let timeout = settings.request_timeout();
        let client = reqwest::Client::builder()
            .user_agent(format!("ChatEBHC/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            feed_url: settings.feed_url.clone(),
            staging_dir: settings.resolved_staging_dir(),
            timeout,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    async fn fetch_manifest(&self) -> Result<FeedManifest> {
        let resp = self.client.get(&self.feed_url).timeout(self.timeout).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Network(format!("feed returned HTTP {status}")));
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::FeedParse(e.to_string()))
    }

    /// Remove leftovers of earlier sessions (old artifacts, orphaned partials).
    fn clear_staging(&self) -> Result<()> {
        fs::create_dir_all(&self.staging_dir)?;
        for entry in fs::read_dir(&self.staging_dir)? {
            let path = entry?.path();
            if path.is_file()
                && let Err(e) = fs::remove_file(&path)
            {
                log::warn!("Could not remove stale update file {}: {e}", path.display());
            }
        }
        Ok(())
    }

    async fn fetch_artifact(
        &self,
        asset: &ReleaseAsset,
        events: &UnboundedSender<FeedEvent>,
    ) -> Result<(PathBuf, u64)> {
        self.clear_staging()?;
        let artifact = self.staging_dir.join(&asset.file_name);

        let resp = self.client.get(&asset.download_url).send().await?.error_for_status()?;
        let content_length = resp.content_length();
        let total = if asset.file_size > 0 { asset.file_size } else { content_length.unwrap_or(0) };

        let _ = events.unbounded_send(FeedEvent::Started {
            version: asset.version.clone(),
            artifact: artifact.clone(),
            total,
        });

        // Dropped (and deleted) on every early return below.
        let mut partial =
            tempfile::Builder::new().prefix(".partial-").tempfile_in(&self.staging_dir)?;
        let mut hasher = Sha256::new();
        let mut stream = resp.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_pct: u8 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            partial.write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;

            let pct = staged_percent(downloaded, total);
            if pct != last_pct {
                last_pct = pct;
                let _ = events.unbounded_send(FeedEvent::Progress(DownloadProgress {
                    bytes_transferred: downloaded,
                    bytes_total: total,
                    percent: f64::from(pct),
                }));
            }
        }
        partial.flush()?;

        if downloaded == 0 {
            return Err(Error::ArtifactIntegrity("download was empty".to_string()));
        }
        if asset.file_size > 0 && downloaded != asset.file_size {
            return Err(Error::ArtifactIntegrity(format!(
                "expected {} bytes, received {downloaded}",
                asset.file_size
            )));
        }
        if let Some(expected) = content_length
            && downloaded < expected
        {
            return Err(Error::ArtifactIntegrity(format!(
                "download ended after {downloaded} of {expected} bytes"
            )));
        }
        if let Some(expected) = &asset.sha256 {
            let actual = to_hex(&hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Error::ArtifactIntegrity(format!(
                    "checksum mismatch (expected {expected}, got {actual})"
                )));
            }
        }

        partial.persist(&artifact).map_err(|e| e.error)?;
        Ok((artifact, downloaded))
    }
}

impl UpdateFeed for HttpFeedClient {
    async fn check_for_update(&self, current_version: &str) -> Result<UpdateCheckResult> {
        let platform = platform_key();
        log::info!("Update check: version={current_version}, platform={platform}");

        let manifest = self.fetch_manifest().await?;
        match resolve_release(&manifest, current_version, &platform)? {
            Some(asset) => Ok(UpdateCheckResult::newer(current_version, asset)),
            None => Ok(UpdateCheckResult::up_to_date(current_version)),
        }
    }

    async fn download(&self, asset: &ReleaseAsset, events: UnboundedSender<FeedEvent>) {
        log::info!("Downloading update {} from {}", asset.version, asset.download_url);
        match self.fetch_artifact(asset, &events).await {
            Ok((artifact, bytes)) => {
                log::info!("Update {} staged at {}", asset.version, artifact.display());
                let _ = events.unbounded_send(FeedEvent::Progress(DownloadProgress {
                    bytes_transferred: bytes,
                    bytes_total: bytes,
                    percent: 100.0,
                }));
                let _ = events.unbounded_send(FeedEvent::Completed {
                    version: asset.version.clone(),
                    artifact,
                });
            }
            Err(e) => {
                log::error!("Update download failed: {e}");
                let _ = events.unbounded_send(FeedEvent::Failed(ErrorInfo::from(&e)));
            }
        }
    }
}
