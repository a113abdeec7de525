//! Platform installer handoff.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

use super::host::Relauncher;

const APP_BUNDLE_NAME: &str = "Chat EBHC.app";

/// How a staged artifact gets installed, decided from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffKind {
    /// NSIS setup executable, run silently and told to start the app again.
    WindowsSetup,
    MsiPackage,
    /// Zipped `.app` bundle swapped in place of the running one.
    MacBundleZip,
    AppImage,
}

pub fn handoff_kind(artifact: &Path) -> Result<HandoffKind> {
    let ext = artifact
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "exe" => Ok(HandoffKind::WindowsSetup),
        "msi" => Ok(HandoffKind::MsiPackage),
        "zip" => Ok(HandoffKind::MacBundleZip),
        "appimage" => Ok(HandoffKind::AppImage),
        _ => Err(Error::InstallHandoff(format!(
            "don't know how to install {}",
            artifact.display()
        ))),
    }
}

type ExitHook = Box<dyn FnMut() + Send>;

/// Spawns the platform installer, then runs the exit hook.
pub struct ProcessRelauncher {
    on_handoff: ExitHook,
}

impl ProcessRelauncher {
    /// `on_handoff` runs once the installer is spawned and should make the
    /// process exit, e.g. by asking the UI event loop to quit.
    pub fn with_exit_hook(on_handoff: impl FnMut() + Send + 'static) -> Self {
        Self { on_handoff: Box::new(on_handoff) }
    }

    fn spawn_installer(&self, artifact: &Path) -> Result<()> {
        match handoff_kind(artifact)? {
            HandoffKind::WindowsSetup => {
                Command::new(artifact).args(["/S", "--updated", "--force-run"]).spawn()?;
            }
            HandoffKind::MsiPackage => {
                Command::new("msiexec").arg("/i").arg(artifact).arg("/passive").spawn()?;
            }
            HandoffKind::MacBundleZip => {
                let app_bundle = current_app_bundle();
                swap_app_bundle(&app_bundle, artifact)?;
                Command::new("open").arg("-n").arg(&app_bundle).spawn()?;
            }
            HandoffKind::AppImage => {
                let target = replace_appimage(artifact)?;
                Command::new(&target).spawn()?;
            }
        }
        Ok(())
    }
}

impl Relauncher for ProcessRelauncher {
    fn relaunch_with_artifact(&mut self, artifact: &Path) -> Result<()> {
        self.spawn_installer(artifact).map_err(|e| match e {
            Error::InstallHandoff(_) => e,
            other => Error::InstallHandoff(other.to_string()),
        })?;
        (self.on_handoff)();
        Ok(())
    }
}

/// Bundle containing the running executable, or the default install location
/// when running outside a bundle.
fn current_app_bundle() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => match exe.parent().and_then(|p| p.parent()).and_then(|p| p.parent()) {
            Some(bundle) if bundle.extension().is_some_and(|e| e == "app") => bundle.to_path_buf(),
            _ => {
                log::info!("Not running from .app bundle, will install to /Applications/");
                Path::new("/Applications").join(APP_BUNDLE_NAME)
            }
        },
        Err(e) => {
            log::error!("Cannot get current exe: {e}");
            Path::new("/Applications").join(APP_BUNDLE_NAME)
        }
    }
}

/// Extract the zip next to `app_bundle` and swap the bundles, restoring the
/// old one if the new one cannot be moved into place.
fn swap_app_bundle(app_bundle: &Path, zip_path: &Path) -> Result<()> {
    let parent = app_bundle.parent().unwrap_or_else(|| Path::new("/tmp"));
    let temp_dir = parent.join(".chat-ebhc-update-tmp");
    let _ = fs::remove_dir_all(&temp_dir);
    fs::create_dir_all(&temp_dir)?;

    let extract = Command::new("ditto").args(["-x", "-k"]).arg(zip_path).arg(&temp_dir).output()?;
    if !extract.status.success() {
        let _ = fs::remove_dir_all(&temp_dir);
        return Err(Error::InstallHandoff(format!(
            "extraction failed: {}",
            String::from_utf8_lossy(&extract.stderr)
        )));
    }

    let extracted_app = fs::read_dir(&temp_dir)?.find_map(|e| {
        let path = e.ok()?.path();
        path.extension().is_some_and(|ext| ext == "app").then_some(path)
    });
    let Some(extracted_app) = extracted_app else {
        let _ = fs::remove_dir_all(&temp_dir);
        return Err(Error::InstallHandoff("no .app found in update".to_string()));
    };

    if app_bundle.exists() {
        let backup = app_bundle.with_extension("app.bak");
        let _ = fs::remove_dir_all(&backup);
        if let Err(e) = fs::rename(app_bundle, &backup) {
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(Error::InstallHandoff(format!("could not back up current app: {e}")));
        }
        if let Err(e) = fs::rename(&extracted_app, app_bundle) {
            let _ = fs::rename(&backup, app_bundle);
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(Error::InstallHandoff(format!("could not move new app into place: {e}")));
        }
        let _ = fs::remove_dir_all(&backup);
    } else if let Err(e) = fs::rename(&extracted_app, app_bundle) {
        let _ = fs::remove_dir_all(&temp_dir);
        return Err(Error::InstallHandoff(format!(
            "could not install to {}: {e}",
            app_bundle.display()
        )));
    }

    let _ = fs::remove_dir_all(&temp_dir);
    Ok(())
}

/// Put the new AppImage where the running one lives (`$APPIMAGE`), or run it
/// from the staging dir when we were not started from an AppImage.
fn replace_appimage(artifact: &Path) -> Result<PathBuf> {
    make_executable(artifact)?;
    let Some(current) = std::env::var_os("APPIMAGE").map(PathBuf::from) else {
        return Ok(artifact.to_path_buf());
    };

    // Same directory as the target so the final rename is atomic.
    let dir = current.parent().unwrap_or_else(|| Path::new("."));
    let staged = tempfile::Builder::new().prefix(".chat-ebhc-").tempfile_in(dir)?;
    fs::copy(artifact, staged.path())?;
    make_executable(staged.path())?;
    staged.persist(&current).map_err(|e| e.error)?;
    Ok(current)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
