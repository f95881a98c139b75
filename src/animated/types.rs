// SPDX-License-Identifier: MPL-2.0

//! Core types for animated wallpaper playback.

use std::time::Duration;

use image::RgbaImage;

/// Target cadence of the frame-sequence tick (60 FPS, best effort).
pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// GIF frames with a delay at or below this are shown for [`DEFAULT_FRAME_DELAY`].
pub(crate) const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);

/// Delay used for GIF frames that declare no usable delay.
pub(crate) const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Identifies one acquired stream player within an engine.
///
/// Messages from a player that has since been released carry a stale id and
/// are ignored.
pub type PlayerId = u64;

/// A decoded video frame.
#[derive(Clone)]
pub struct VideoFrame {
    /// The decoded image data (RGBA).
    pub image: RgbaImage,
    /// Presentation timestamp (nanoseconds).
    pub pts: Option<u64>,
}

/// Something that happened inside a stream player.
pub enum StreamEvent {
    /// Asynchronous preparation finished; playback may start.
    Prepared,
    /// Asynchronous preparation failed.
    PrepareFailed(String),
    /// Playback reached the end of the stream.
    EndOfStream,
    /// A non-fatal playback error.
    Error(String),
    /// A decoded frame ready to be shown.
    Frame(VideoFrame),
}

impl std::fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEvent::Prepared => f.write_str("Prepared"),
            StreamEvent::PrepareFailed(why) => f.debug_tuple("PrepareFailed").field(why).finish(),
            StreamEvent::EndOfStream => f.write_str("EndOfStream"),
            StreamEvent::Error(why) => f.debug_tuple("Error").field(why).finish(),
            StreamEvent::Frame(frame) => f
                .debug_struct("Frame")
                .field("width", &frame.image.width())
                .field("height", &frame.image.height())
                .field("pts", &frame.pts)
                .finish(),
        }
    }
}

/// A [`StreamEvent`] tagged with the player that produced it.
#[derive(Debug)]
pub struct PlayerMessage {
    pub id: PlayerId,
    pub event: StreamEvent,
}
