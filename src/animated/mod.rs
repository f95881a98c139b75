// SPDX-License-Identifier: MPL-2.0

//! Animated wallpaper media.
//!
//! # Module Structure
//!
//! - [`types`]: Player messages and timing constants
//! - [`detection`]: File type detection utilities
//! - [`sequence`]: GIF decoded into memory and sampled by time
//! - [`still`]: Still frame extraction for static wallpapers
//! - `video_player`: GStreamer stream player (`animated` feature)
//!
//! # Supported Formats
//!
//! | Format | Extension | Engine |
//! |--------|-----------|--------|
//! | GIF    | `.gif`    | Frame loop, CPU decoded and kept in memory |
//! | MPEG-4 | `.mp4`    | Stream |
//! | QuickTime | `.mov` | Stream |
//! | AVI    | `.avi`    | Stream |
//! | Matroska | `.mkv`  | Stream |
//! | WebM   | `.webm`   | Stream |
//! | 3GPP   | `.3gp`    | Stream |
//! | Flash Video | `.flv` | Stream |

pub mod detection;
pub mod sequence;
pub mod still;
mod types;
#[cfg(feature = "animated")]
mod video_player;

pub use detection::animated_kind;
pub use sequence::FrameSequence;
pub(crate) use types::TICK_INTERVAL;
pub use types::{PlayerId, PlayerMessage, StreamEvent, VideoFrame};

#[cfg(feature = "animated")]
pub use video_player::GstBackend;

/// Stream backend used by the daemon.
#[cfg(feature = "animated")]
pub type DefaultBackend = GstBackend;

/// Stream backend used by the daemon.
#[cfg(not(feature = "animated"))]
pub type DefaultBackend = NoVideoBackend;

#[cfg(not(feature = "animated"))]
pub use no_video::NoVideoBackend;

#[cfg(not(feature = "animated"))]
mod no_video {
    use std::path::Path;

    use calloop::channel::{Sender, SyncSender};

    use super::{PlayerId, PlayerMessage};
    use crate::engine::{StreamBackend, StreamPlayer};

    /// Stream backend for builds without video support; every acquire fails.
    pub struct NoVideoBackend;

    impl NoVideoBackend {
        pub fn new(_events: Sender<PlayerMessage>, _frames: SyncSender<PlayerMessage>) -> Self {
            Self
        }
    }

    pub enum NoPlayer {}

    impl StreamBackend for NoVideoBackend {
        type Player = NoPlayer;

        fn prepare(&mut self, path: &Path, _id: PlayerId) -> eyre::Result<NoPlayer> {
            eyre::bail!(
                "cannot play {}: video support was not compiled in",
                path.display()
            )
        }
    }

    impl StreamPlayer for NoPlayer {
        fn start(&mut self) -> eyre::Result<()> {
            match *self {}
        }

        fn pause(&mut self) -> eyre::Result<()> {
            match *self {}
        }

        fn seek_to_start(&mut self) -> eyre::Result<()> {
            match *self {}
        }

        fn is_playing(&self) -> bool {
            match *self {}
        }

        fn has_ended(&self) -> bool {
            match *self {}
        }
    }
}
