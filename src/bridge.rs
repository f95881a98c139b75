// SPDX-License-Identifier: MPL-2.0

//! Set-wallpaper requests from a UI layer.
//!
//! Animated media becomes a live wallpaper when the host can run one. Anything
//! else, or a live wallpaper that cannot be started, is applied as a still
//! image.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use eyre::{OptionExt, WrapErr};
use image::DynamicImage;
use neumowall_config::{
    MediaKind, NAME, ParseError, Preferences, WallpaperTarget, state::StaticState,
};
use nix::sys::signal::Signal;
use tracing::{info, warn};

use crate::{
    animated::{animated_kind, still},
    pidfile,
};

/// Media kind a caller asks for, overriding extension-based detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedKind {
    Video,
    Gif,
    /// Always apply a still image, even for animated media.
    Image,
}

impl FromStr for RequestedKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(RequestedKind::Video),
            "gif" => Ok(RequestedKind::Gif),
            "image" => Ok(RequestedKind::Image),
            other => Err(ParseError::new(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetWallpaperRequest {
    pub file_path: PathBuf,
    pub target: WallpaperTarget,
    pub media_kind: Option<RequestedKind>,
}

/// A static wallpaper could not be applied.
#[derive(Debug, thiserror::Error)]
#[error("Failed to set wallpaper: {message}")]
pub struct BridgeError {
    message: String,
}

impl BridgeError {
    pub const CODE: &'static str = "WALLPAPER_ERROR";

    #[must_use]
    pub fn code(&self) -> &'static str {
        Self::CODE
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Platform services the bridge drives.
pub trait WallpaperHost {
    /// Persist `path` as the live wallpaper media.
    fn save_live_media(&mut self, path: &Path, kind: MediaKind) -> eyre::Result<()>;

    /// Show the live wallpaper built from the saved media.
    fn launch_live_wallpaper(&mut self) -> eyre::Result<()>;

    fn set_static(&mut self, image: &DynamicImage, target: WallpaperTarget) -> eyre::Result<()>;
}

/// Apply the wallpaper described by `request`.
///
/// Returns `Ok(false)` when the file is missing or holds nothing displayable.
pub fn set_wallpaper<H: WallpaperHost + ?Sized>(
    host: &mut H,
    request: &SetWallpaperRequest,
) -> Result<bool, BridgeError> {
    let path = request.file_path.as_path();

    if !path.exists() {
        warn!(path = %path.display(), "wallpaper file does not exist");
        return Ok(false);
    }

    let live_kind =
        animated_kind(path).filter(|_| request.media_kind != Some(RequestedKind::Image));

    if let Some(kind) = live_kind {
        match set_live(host, path, kind) {
            Ok(()) => {
                info!(path = %path.display(), %kind, "live wallpaper set");
                return Ok(true);
            }
            Err(why) => {
                warn!(
                    ?why,
                    path = %path.display(),
                    "live wallpaper unavailable, using a still image"
                );
                return set_static(host, path, WallpaperTarget::Home);
            }
        }
    }

    set_static(host, path, request.target)
}

fn set_live<H: WallpaperHost + ?Sized>(
    host: &mut H,
    path: &Path,
    kind: MediaKind,
) -> eyre::Result<()> {
    host.save_live_media(path, kind)?;
    host.launch_live_wallpaper()
}

fn set_static<H: WallpaperHost + ?Sized>(
    host: &mut H,
    path: &Path,
    target: WallpaperTarget,
) -> Result<bool, BridgeError> {
    let Some(image) = still::extract(path) else {
        return Ok(false);
    };

    host.set_static(&image, target).map_err(|why| BridgeError {
        message: format!("{why:#}"),
    })?;

    info!(path = %path.display(), %target, "static wallpaper set");
    Ok(true)
}

/// Host backed by the preferences file and the running daemon.
#[derive(Debug)]
pub struct DesktopHost {
    prefs_path: PathBuf,
    state_path: PathBuf,
    image_dir: PathBuf,
}

impl DesktopHost {
    pub fn new() -> eyre::Result<Self> {
        let image_dir = dirs::data_dir()
            .ok_or_eyre("no data directory")?
            .join(NAME);

        Ok(Self::with_paths(
            Preferences::path()?,
            StaticState::path()?,
            image_dir,
        ))
    }

    #[must_use]
    pub fn with_paths(prefs_path: PathBuf, state_path: PathBuf, image_dir: PathBuf) -> Self {
        Self {
            prefs_path,
            state_path,
            image_dir,
        }
    }
}

impl WallpaperHost for DesktopHost {
    fn save_live_media(&mut self, path: &Path, kind: MediaKind) -> eyre::Result<()> {
        let mut prefs = Preferences::load_from(&self.prefs_path)?;
        prefs.set_media_path(path);
        prefs.set_media_type(kind);
        prefs.save_to(&self.prefs_path)?;
        Ok(())
    }

    fn launch_live_wallpaper(&mut self) -> eyre::Result<()> {
        pidfile::signal_daemon(Signal::SIGHUP)
    }

    fn set_static(&mut self, image: &DynamicImage, target: WallpaperTarget) -> eyre::Result<()> {
        fs::create_dir_all(&self.image_dir)
            .wrap_err_with(|| format!("failed to create {}", self.image_dir.display()))?;

        let file = self.image_dir.join(format!("static-{}.png", target.as_str()));
        image
            .save_with_format(&file, image::ImageFormat::Png)
            .wrap_err_with(|| format!("failed to write {}", file.display()))?;

        let mut state = StaticState::load_from(&self.state_path)?;
        state.apply(target, &file);
        state.save_to(&self.state_path)?;
        Ok(())
    }
}
