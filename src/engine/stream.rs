// SPDX-License-Identifier: MPL-2.0

//! Video wallpaper driven by an asynchronously prepared stream player.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, trace, warn};

use crate::{
    animated::{PlayerId, PlayerMessage, StreamEvent, VideoFrame},
    draw::FitPainter,
    surface::{self, DrawSurface, PixelFormat},
};

/// Creates stream players.
///
/// `prepare` must not block on decoding: the returned player reports
/// [`StreamEvent::Prepared`] or [`StreamEvent::PrepareFailed`] later, tagged
/// with `id`.
pub trait StreamBackend {
    type Player: StreamPlayer;

    fn prepare(&mut self, path: &Path, id: PlayerId) -> eyre::Result<Self::Player>;
}

/// Controls one prepared media stream. Dropping the player releases it.
pub trait StreamPlayer {
    fn start(&mut self) -> eyre::Result<()>;

    fn pause(&mut self) -> eyre::Result<()>;

    fn seek_to_start(&mut self) -> eyre::Result<()>;

    fn is_playing(&self) -> bool;

    /// Whether the stream reached its end and has not been rewound since.
    fn has_ended(&self) -> bool;

    /// Start playback, rewinding first if the stream already ended.
    fn resume(&mut self) -> eyre::Result<()> {
        if self.has_ended() {
            self.seek_to_start()?;
        }
        self.start()
    }
}

pub struct StreamEngine<B: StreamBackend> {
    path: PathBuf,
    backend: B,
    player: Option<B::Player>,
    /// Id of the most recently acquired player.
    player_id: PlayerId,
    prepared: bool,
    visible: bool,
    was_playing: bool,
    painter: FitPainter,
    frames_painted: u64,
}

impl<B: StreamBackend> StreamEngine<B> {
    pub fn new(path: PathBuf, backend: B) -> Self {
        Self {
            path,
            backend,
            player: None,
            player_id: 0,
            prepared: false,
            visible: false,
            was_playing: false,
            painter: FitPainter::default(),
            frames_painted: 0,
        }
    }

    #[must_use]
    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    #[must_use]
    pub fn was_playing(&self) -> bool {
        self.was_playing
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(StreamPlayer::is_playing)
    }

    pub fn on_surface_ready(&mut self, surface: &mut dyn DrawSurface) {
        surface.set_format(PixelFormat::Rgba8888);

        // A second surface replaces the first one's player.
        self.release();

        self.player_id += 1;
        match self.backend.prepare(&self.path, self.player_id) {
            Ok(player) => {
                debug!(path = %self.path.display(), id = self.player_id, "preparing video");
                self.player = Some(player);
            }
            Err(why) => {
                warn!(?why, path = %self.path.display(), "failed to acquire video player");
            }
        }
    }

    pub fn on_player_message(&mut self, message: PlayerMessage, surface: &mut dyn DrawSurface) {
        if message.id != self.player_id || !self.has_player() {
            trace!(id = message.id, current = self.player_id, "ignoring stale player message");
            return;
        }

        match message.event {
            StreamEvent::Prepared => self.on_prepared(),

            StreamEvent::PrepareFailed(why) => {
                warn!(%why, path = %self.path.display(), "video preparation failed");
                self.release();
            }

            StreamEvent::EndOfStream => self.on_end_of_stream(),

            StreamEvent::Error(why) => {
                error!(%why, path = %self.path.display(), "video playback error");
            }

            StreamEvent::Frame(frame) => self.paint(surface, &frame),
        }
    }

    fn on_prepared(&mut self) {
        self.prepared = true;
        info!(path = %self.path.display(), "video prepared");

        if !self.visible {
            return;
        }

        if let Some(player) = self.player.as_mut() {
            match player.resume() {
                Ok(()) => self.was_playing = true,
                Err(why) => error!(?why, "failed to start video"),
            }
        }
    }

    fn on_end_of_stream(&mut self) {
        if !self.visible {
            return;
        }

        let Some(player) = self.player.as_mut() else {
            return;
        };

        debug!(path = %self.path.display(), "video ended, looping");
        if let Err(why) = player.seek_to_start().and_then(|()| player.start()) {
            error!(?why, "failed to restart video");
        }
    }

    pub fn on_visibility_changed(&mut self, visible: bool) {
        self.visible = visible;
        debug!(
            visible,
            prepared = self.prepared,
            playing = self.is_playing(),
            was_playing = self.was_playing(),
            "video visibility changed"
        );

        if !self.prepared {
            return;
        }

        let Some(player) = self.player.as_mut() else {
            return;
        };

        if visible {
            if self.was_playing || !player.is_playing() {
                match player.resume() {
                    Ok(()) => self.was_playing = true,
                    Err(why) => error!(?why, "failed to resume video"),
                }
            }
        } else if player.is_playing() {
            match player.pause() {
                Ok(()) => self.was_playing = false,
                Err(why) => error!(?why, "failed to pause video"),
            }
        }
    }

    fn paint(&mut self, surface: &mut dyn DrawSurface, frame: &VideoFrame) {
        if !self.visible {
            return;
        }

        let Some(mut buffer) = surface::lock(surface) else {
            trace!("surface buffer unavailable, dropping video frame");
            return;
        };

        self.frames_painted += 1;
        if let Err(why) = self.painter.paint(&mut buffer, self.frames_painted, &frame.image) {
            error!(?why, "failed to paint video frame");
        }
    }

    /// Release the player. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(player) = self.player.take() {
            debug!(path = %self.path.display(), id = self.player_id, "releasing video player");
            drop(player);
        }

        self.prepared = false;
        self.was_playing = false;
        self.painter.reset();
    }
}
