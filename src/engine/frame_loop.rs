// SPDX-License-Identifier: MPL-2.0

//! GIF wallpaper sampled against a monotonic clock.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use tracing::{debug, error, trace, warn};

use super::{TickOutcome, TickScheduler};
use crate::{
    animated::FrameSequence,
    draw::FitPainter,
    surface::{self, DrawSurface},
};

/// Position within the loop at `now`, for a loop that started at `epoch`.
///
/// Computed from the absolute elapsed time, so late ticks never accumulate
/// drift. A zero-length loop always sits at its start.
#[must_use]
pub fn loop_position(epoch: Instant, now: Instant, loop_duration: Duration) -> Duration {
    let loop_ms = loop_duration.as_millis();
    if loop_ms == 0 {
        return Duration::ZERO;
    }

    let elapsed_ms = now.saturating_duration_since(epoch).as_millis() % loop_ms;
    Duration::from_millis(elapsed_ms as u64)
}

pub struct LoopEngine {
    path: PathBuf,
    sequence: Option<FrameSequence>,
    epoch: Instant,
    visible: bool,
    painter: FitPainter,
}

impl LoopEngine {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            sequence: None,
            epoch: Instant::now(),
            visible: false,
            painter: FitPainter::default(),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.sequence.is_some()
    }

    /// Position within the loop at `now`, or `None` without decoded frames.
    #[must_use]
    pub fn position(&self, now: Instant) -> Option<Duration> {
        let sequence = self.sequence.as_ref()?;
        Some(loop_position(self.epoch, now, sequence.duration()))
    }

    /// Decode the GIF once. A show that arrived before the surface had no
    /// frames to tick, so it is re-armed here.
    pub fn on_surface_ready(&mut self, now: Instant, ticker: &mut dyn TickScheduler) {
        self.epoch = now;

        if self.sequence.is_none() {
            match FrameSequence::open(&self.path) {
                Ok(sequence) => self.sequence = Some(sequence),
                Err(why) => warn!(?why, path = %self.path.display(), "failed to decode GIF"),
            }
        }

        if self.visible && self.is_loaded() {
            ticker.schedule(Duration::ZERO);
        }
    }

    pub fn on_visibility_changed(
        &mut self,
        visible: bool,
        now: Instant,
        ticker: &mut dyn TickScheduler,
    ) {
        let was_visible = std::mem::replace(&mut self.visible, visible);
        debug!(visible, loaded = self.is_loaded(), "GIF visibility changed");

        if visible {
            if !was_visible {
                self.epoch = now;
            }
            ticker.schedule(Duration::ZERO);
        } else {
            ticker.cancel();
        }
    }

    /// Paint the frame due at `now`.
    pub fn tick(&mut self, surface: &mut dyn DrawSurface, now: Instant) -> TickOutcome {
        if !self.visible {
            return TickOutcome::Stop;
        }

        let (Some(position), Some(sequence)) = (self.position(now), self.sequence.as_ref()) else {
            return TickOutcome::Stop;
        };

        let index = sequence.frame_index_at(position);

        match surface::lock(surface) {
            Some(mut buffer) => {
                if let Some(frame) = sequence.frame(index) {
                    if let Err(why) = self.painter.paint(&mut buffer, index as u64, frame) {
                        error!(?why, index, "failed to paint GIF frame");
                    }
                }
            }
            None => trace!(index, "surface buffer unavailable, skipping frame"),
        }

        TickOutcome::Continue
    }

    /// Stop ticking and drop the decoded frames. Safe to call any number of times.
    pub fn release(&mut self, ticker: &mut dyn TickScheduler) {
        ticker.cancel();
        self.visible = false;

        if self.sequence.take().is_some() {
            debug!(path = %self.path.display(), "released GIF frames");
        }
        self.painter.reset();
    }
}
