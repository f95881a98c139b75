// SPDX-License-Identifier: MPL-2.0

//! Live wallpaper engines.
//!
//! The host builds exactly one [`WallpaperEngine`] per wallpaper session with
//! [`select`] and then drives it with surface lifecycle callbacks, player
//! messages and timer ticks, all delivered on the same event loop thread.
//!
//! - [`StreamEngine`]: video played through an asynchronously prepared player
//! - [`LoopEngine`]: GIF decoded once and sampled against the clock
//! - `Null`: nothing configured, nothing drawn

mod frame_loop;
mod stream;
#[cfg(test)]
mod tests;

use std::{path::Path, time::Duration, time::Instant};

use neumowall_config::{MediaKind, Preferences};
use tracing::info;

use crate::{animated::PlayerMessage, surface::DrawSurface};

pub use frame_loop::{LoopEngine, loop_position};
pub use stream::{StreamBackend, StreamEngine, StreamPlayer};

/// Arms and disarms the host timer that drives [`WallpaperEngine::on_tick`].
pub trait TickScheduler {
    /// Arm the tick to fire after `delay`, replacing any pending tick.
    fn schedule(&mut self, delay: Duration);

    /// Disarm the pending tick, if any.
    fn cancel(&mut self);
}

/// Whether a tick wants to be re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Stream,
    Loop,
    Null,
}

/// Decide which engine plays a declared media type.
#[must_use]
pub fn engine_kind(media_type: Option<&str>, path_exists: bool) -> EngineKind {
    match media_type.map(str::parse::<MediaKind>) {
        Some(Ok(_)) if !path_exists => EngineKind::Null,
        Some(Ok(MediaKind::Video)) => EngineKind::Stream,
        Some(Ok(MediaKind::Gif)) => EngineKind::Loop,
        _ => EngineKind::Null,
    }
}

/// Build the engine for the current preferences.
///
/// The choice is fixed for the engine's lifetime; preference changes apply
/// to the next engine the host builds.
pub fn select<B: StreamBackend>(prefs: &Preferences, backend: B) -> WallpaperEngine<B> {
    let path = prefs.media_path();
    let exists = path.is_some_and(Path::is_file);
    let kind = engine_kind(prefs.media_type(), exists);

    info!(
        path = ?path,
        media_type = ?prefs.media_type(),
        exists,
        ?kind,
        "selected wallpaper engine"
    );

    match (kind, path) {
        (EngineKind::Stream, Some(path)) => {
            WallpaperEngine::Stream(StreamEngine::new(path.to_path_buf(), backend))
        }
        (EngineKind::Loop, Some(path)) => {
            WallpaperEngine::Loop(LoopEngine::new(path.to_path_buf()))
        }
        _ => WallpaperEngine::Null,
    }
}

/// One wallpaper session's engine.
pub enum WallpaperEngine<B: StreamBackend> {
    Stream(StreamEngine<B>),
    Loop(LoopEngine),
    Null,
}

impl<B: StreamBackend> WallpaperEngine<B> {
    #[must_use]
    pub fn kind(&self) -> EngineKind {
        match self {
            WallpaperEngine::Stream(_) => EngineKind::Stream,
            WallpaperEngine::Loop(_) => EngineKind::Loop,
            WallpaperEngine::Null => EngineKind::Null,
        }
    }

    pub fn on_surface_ready(
        &mut self,
        surface: &mut dyn DrawSurface,
        now: Instant,
        ticker: &mut dyn TickScheduler,
    ) {
        match self {
            WallpaperEngine::Stream(engine) => engine.on_surface_ready(surface),
            WallpaperEngine::Loop(engine) => engine.on_surface_ready(now, ticker),
            WallpaperEngine::Null => {}
        }
    }

    pub fn on_visibility_changed(
        &mut self,
        visible: bool,
        now: Instant,
        ticker: &mut dyn TickScheduler,
    ) {
        match self {
            WallpaperEngine::Stream(engine) => engine.on_visibility_changed(visible),
            WallpaperEngine::Loop(engine) => engine.on_visibility_changed(visible, now, ticker),
            WallpaperEngine::Null => {}
        }
    }

    pub fn on_tick(&mut self, surface: &mut dyn DrawSurface, now: Instant) -> TickOutcome {
        match self {
            WallpaperEngine::Loop(engine) => engine.tick(surface, now),
            WallpaperEngine::Stream(_) | WallpaperEngine::Null => TickOutcome::Stop,
        }
    }

    pub fn on_player_message(&mut self, message: PlayerMessage, surface: &mut dyn DrawSurface) {
        if let WallpaperEngine::Stream(engine) = self {
            engine.on_player_message(message, surface);
        }
    }

    pub fn on_surface_destroyed(&mut self, ticker: &mut dyn TickScheduler) {
        match self {
            WallpaperEngine::Stream(engine) => engine.release(),
            WallpaperEngine::Loop(engine) => engine.release(ticker),
            WallpaperEngine::Null => {}
        }
    }

    pub fn on_engine_destroyed(&mut self, ticker: &mut dyn TickScheduler) {
        self.on_surface_destroyed(ticker);
    }
}
