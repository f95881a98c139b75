// SPDX-License-Identifier: MPL-2.0

//! GStreamer video player.
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! RGBA appsink
//! ```
//!
//! Preparation prerolls the pipeline to `Paused` on GStreamer's threads. Bus
//! messages and decoded samples are forwarded to the event loop through
//! calloop channels, tagged with the player id, so the engine sees them on
//! the same thread as every other callback.

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use calloop::channel::{Sender, SyncSender};
use gstreamer::prelude::*;
use tracing::{debug, info, trace, warn};

use super::types::{PlayerId, PlayerMessage, StreamEvent, VideoFrame};
use crate::engine::{StreamBackend, StreamPlayer};

/// Creates [`VideoPlayer`]s that report back to the event loop.
pub struct GstBackend {
    /// Control events; never dropped.
    events: Sender<PlayerMessage>,
    /// Decoded frames; dropped when the loop falls behind.
    frames: SyncSender<PlayerMessage>,
}

impl GstBackend {
    pub fn new(events: Sender<PlayerMessage>, frames: SyncSender<PlayerMessage>) -> Self {
        Self { events, frames }
    }
}

impl StreamBackend for GstBackend {
    type Player = VideoPlayer;

    fn prepare(&mut self, path: &Path, id: PlayerId) -> eyre::Result<VideoPlayer> {
        VideoPlayer::prepare(path, id, self.events.clone(), self.frames.clone())
    }
}

/// One video pipeline. Dropping it shuts the pipeline down.
pub struct VideoPlayer {
    pipeline: gstreamer::Pipeline,
    playing: bool,
    ended: Arc<AtomicBool>,
}

/// Quote `path` for use as a `gst-launch` property value.
pub(crate) fn launch_location(path: &Path) -> eyre::Result<String> {
    let path_str = path
        .to_str()
        .ok_or_else(|| eyre::eyre!("Invalid path: {}", path.display()))?;

    Ok(path_str.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Build the decode pipeline and fetch its appsink.
pub(crate) fn rgba_pipeline(
    path: &Path,
    sink_properties: &str,
) -> eyre::Result<(gstreamer::Pipeline, gstreamer_app::AppSink)> {
    gstreamer::init()?;

    let pipeline_str = format!(
        "filesrc location=\"{}\" ! decodebin ! videoconvert ! \
         video/x-raw,format=RGBA ! appsink name=sink {sink_properties}",
        launch_location(path)?
    );

    debug!(pipeline = %pipeline_str, "Creating GStreamer pipeline");

    let pipeline = gstreamer::parse::launch(&pipeline_str)?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| eyre::eyre!("Failed to create pipeline"))?;

    let appsink = pipeline
        .by_name("sink")
        .ok_or_else(|| eyre::eyre!("Failed to get appsink from pipeline"))?
        .downcast::<gstreamer_app::AppSink>()
        .map_err(|_| eyre::eyre!("Element 'sink' is not an AppSink"))?;

    Ok((pipeline, appsink))
}

/// Copy a decoded RGBA sample into an image, dropping any row padding.
pub(crate) fn sample_to_frame(sample: &gstreamer::Sample) -> Option<VideoFrame> {
    let buffer = sample.buffer()?;
    let caps = sample.caps()?;
    let video_info = gstreamer_video::VideoInfo::from_caps(caps).ok()?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = usize::try_from(*video_info.stride().first()?).ok()?;
    let row_len = width as usize * 4;

    let map = buffer.map_readable().ok()?;
    let data = map.as_slice();

    if stride < row_len || data.len() < stride * height as usize {
        warn!(
            data_len = data.len(),
            stride,
            width,
            height,
            "Buffer size mismatch"
        );
        return None;
    }

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    Some(VideoFrame {
        image: image::RgbaImage::from_raw(width, height, pixels)?,
        pts: buffer.pts().map(|pts| pts.nseconds()),
    })
}

impl VideoPlayer {
    /// Start prerolling `path`. Completion arrives later as a message with `id`.
    pub fn prepare(
        path: &Path,
        id: PlayerId,
        events: Sender<PlayerMessage>,
        frames: SyncSender<PlayerMessage>,
    ) -> eyre::Result<Self> {
        let (pipeline, appsink) = rgba_pipeline(path, "sync=true max-buffers=2 drop=true")?;

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;

                    if let Some(frame) = sample_to_frame(&sample) {
                        let message = PlayerMessage {
                            id,
                            event: StreamEvent::Frame(frame),
                        };
                        if frames.try_send(message).is_err() {
                            trace!(id, "event loop busy, dropping video frame");
                        }
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let ended = Arc::new(AtomicBool::new(false));
        let bus = pipeline
            .bus()
            .ok_or_else(|| eyre::eyre!("pipeline has no bus"))?;

        bus.set_sync_handler({
            let ended = Arc::clone(&ended);
            let prepared = AtomicBool::new(false);
            let events = Mutex::new(events);
            let source = path.display().to_string();

            move |_bus, msg| {
                use gstreamer::MessageView;

                let event = match msg.view() {
                    MessageView::AsyncDone(_) if !prepared.swap(true, Ordering::AcqRel) => {
                        Some(StreamEvent::Prepared)
                    }
                    MessageView::Eos(_) => {
                        ended.store(true, Ordering::Release);
                        Some(StreamEvent::EndOfStream)
                    }
                    MessageView::Error(err) => {
                        let why = format!(
                            "{} ({})",
                            err.error(),
                            err.src()
                                .map(|s| s.path_string().to_string())
                                .unwrap_or_default()
                        );
                        if prepared.load(Ordering::Acquire) {
                            Some(StreamEvent::Error(why))
                        } else {
                            Some(StreamEvent::PrepareFailed(why))
                        }
                    }
                    MessageView::Warning(warning) => {
                        warn!(
                            src = ?warning.src().map(|s| s.path_string()),
                            error = %warning.error(),
                            path = %source,
                            "GStreamer pipeline warning"
                        );
                        None
                    }
                    _ => None,
                };

                if let Some(event) = event {
                    if let Ok(events) = events.lock() {
                        let _ = events.send(PlayerMessage { id, event });
                    }
                }

                gstreamer::BusSyncReply::Drop
            }
        });

        if let Err(why) = pipeline.set_state(gstreamer::State::Paused) {
            bus.unset_sync_handler();
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(eyre::eyre!("Failed to preroll pipeline: {:?}", why));
        }

        info!(path = %path.display(), id, "Prerolling video pipeline");

        Ok(Self {
            pipeline,
            playing: false,
            ended,
        })
    }
}

impl StreamPlayer for VideoPlayer {
    fn start(&mut self) -> eyre::Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| eyre::eyre!("Failed to start pipeline: {:?}", e))?;
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> eyre::Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|e| eyre::eyre!("Failed to pause pipeline: {:?}", e))?;
        self.playing = false;
        Ok(())
    }

    fn seek_to_start(&mut self) -> eyre::Result<()> {
        let seek_flags = gstreamer::SeekFlags::FLUSH
            | gstreamer::SeekFlags::KEY_UNIT
            | gstreamer::SeekFlags::SNAP_BEFORE;

        self.pipeline
            .seek_simple(seek_flags, gstreamer::ClockTime::ZERO)?;
        self.ended.store(false, Ordering::Release);

        Ok(())
    }

    /// A pipeline that hit end-of-stream is not playing until it is seeked back.
    fn is_playing(&self) -> bool {
        self.playing && !self.has_ended()
    }

    fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }

        if let Err(why) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(?why, "Failed to stop video pipeline on drop");
        }
    }
}
