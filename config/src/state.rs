use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, NAME, WallpaperTarget};

pub const STATE_FILE: &str = "static_state.ron";

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
#[must_use]
pub struct StaticState {
    /// Image currently applied to the home screen
    pub home: Option<PathBuf>,
    /// Image currently applied to the lock screen
    pub lock: Option<PathBuf>,
}

impl StaticState {
    pub fn path() -> Result<PathBuf, Error> {
        dirs::state_dir()
            .or_else(dirs::data_dir)
            .map(|dir| dir.join(NAME).join(STATE_FILE))
            .ok_or(Error::NoConfigDir)
    }

    pub fn load_from(path: &Path) -> Result<Self, Error> {
        crate::read_ron(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        crate::write_ron(path, self)
    }

    /// Records `image` as applied to every slot covered by `target`.
    pub fn apply(&mut self, target: WallpaperTarget, image: &Path) {
        if target.includes_home() {
            self.home = Some(image.to_path_buf());
        }
        if target.includes_lock() {
            self.lock = Some(image.to_path_buf());
        }
    }
}
