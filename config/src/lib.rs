// SPDX-License-Identifier: MPL-2.0

//! Persisted preferences shared by the wallpaper daemon and the set-wallpaper bridge.

pub mod state;

use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const NAME: &str = "neumowall";
pub const PREFS_FILE: &str = "wallpaper_prefs.ron";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no configuration directory available on this system")]
    NoConfigDir,
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize preferences")]
    Serialize(#[from] ron::Error),
}

/// Kind of animated media a live wallpaper plays.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Streamed through a video decoder.
    Video,
    /// Decoded once into memory and sampled against the clock.
    Gif,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized value: {0}")]
pub struct ParseError(String);

impl ParseError {
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl FromStr for MediaKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaKind::Video),
            "gif" => Ok(MediaKind::Gif),
            other => Err(ParseError::new(other)),
        }
    }
}

/// Which wallpaper slot a static image is applied to.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WallpaperTarget {
    #[default]
    Home,
    Lock,
    Both,
}

impl WallpaperTarget {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WallpaperTarget::Home => "home",
            WallpaperTarget::Lock => "lock",
            WallpaperTarget::Both => "both",
        }
    }

    #[must_use]
    pub fn includes_home(self) -> bool {
        matches!(self, WallpaperTarget::Home | WallpaperTarget::Both)
    }

    #[must_use]
    pub fn includes_lock(self) -> bool {
        matches!(self, WallpaperTarget::Lock | WallpaperTarget::Both)
    }
}

impl fmt::Display for WallpaperTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WallpaperTarget {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(WallpaperTarget::Home),
            "lock" => Ok(WallpaperTarget::Lock),
            "both" => Ok(WallpaperTarget::Both),
            other => Err(ParseError::new(other)),
        }
    }
}

/// The live wallpaper selection.
///
/// The media type is kept as the raw stored string so that a value written by a
/// newer or older bridge is still readable; interpreting it is up to the reader.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
#[must_use]
pub struct Preferences {
    pub media_path: Option<PathBuf>,
    pub media_type: Option<String>,
}

impl Preferences {
    /// Location of the preferences file.
    ///
    /// # Errors
    ///
    /// Fails if the platform has no configuration directory.
    pub fn path() -> Result<PathBuf, Error> {
        dirs::config_dir()
            .map(|dir| dir.join(NAME).join(PREFS_FILE))
            .ok_or(Error::NoConfigDir)
    }

    /// Load the preferences from their default location.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::path()?)
    }

    /// Load the preferences from `path`. A missing file yields empty preferences.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        read_ron(path)
    }

    /// Persist the preferences to their default location.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&Self::path()?)
    }

    /// Persist the preferences to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        write_ron(path, self)
    }

    #[must_use]
    pub fn media_path(&self) -> Option<&Path> {
        self.media_path.as_deref()
    }

    #[must_use]
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn set_media_path(&mut self, path: impl Into<PathBuf>) {
        self.media_path = Some(path.into());
    }

    pub fn set_media_type(&mut self, kind: MediaKind) {
        self.media_type = Some(kind.as_str().to_owned());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub(crate) fn read_ron<T>(path: &Path) -> Result<T, Error>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(why) if why.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no stored file, using defaults");
            return Ok(T::default());
        }
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    ron::from_str(&contents).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_ron<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let contents = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())?;
    fs::write(path, contents).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load_from(&dir.path().join(PREFS_FILE)).unwrap();
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.media_path().is_none());
        assert!(prefs.media_type().is_none());
    }

    #[test]
    fn saved_preferences_are_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(PREFS_FILE);

        let mut prefs = Preferences::default();
        prefs.set_media_path("/media/clip.mp4");
        prefs.set_media_type(MediaKind::Video);
        prefs.save_to(&path).unwrap();

        let loaded = Preferences::load_from(&path).unwrap();
        assert_eq!(loaded.media_path(), Some(Path::new("/media/clip.mp4")));
        assert_eq!(loaded.media_type(), Some("video"));
    }

    #[test]
    fn unknown_media_type_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE);
        fs::write(&path, r#"(media_path: Some("/a.webp"), media_type: Some("webp"))"#).unwrap();

        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(prefs.media_type(), Some("webp"));
        assert!(prefs.media_type().unwrap().parse::<MediaKind>().is_err());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE);
        fs::write(&path, "not ron at all {").unwrap();

        assert!(matches!(
            Preferences::load_from(&path),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn clear_forgets_the_selection() {
        let mut prefs = Preferences::default();
        prefs.set_media_path("/media/loop.gif");
        prefs.set_media_type(MediaKind::Gif);
        prefs.clear();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn targets_parse_and_cover_slots() {
        assert_eq!("home".parse::<WallpaperTarget>().unwrap(), WallpaperTarget::Home);
        assert_eq!("both".parse::<WallpaperTarget>().unwrap(), WallpaperTarget::Both);
        assert!("desktop".parse::<WallpaperTarget>().is_err());

        assert!(WallpaperTarget::Both.includes_home());
        assert!(WallpaperTarget::Both.includes_lock());
        assert!(!WallpaperTarget::Lock.includes_home());
        assert!(!WallpaperTarget::Home.includes_lock());
    }
}
