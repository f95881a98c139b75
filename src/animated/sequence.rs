// SPDX-License-Identifier: MPL-2.0

//! Animated GIF decoded once into memory and sampled by time.

use std::{fs::File, io::BufReader, path::Path, time::Duration};

use eyre::WrapErr;
use image::{AnimationDecoder, Frame, ImageResult, RgbaImage, codecs::gif::GifDecoder};
use tracing::debug;

use super::types::{DEFAULT_FRAME_DELAY, MIN_FRAME_DELAY};

struct SequenceFrame {
    image: RgbaImage,
    /// Offset of this frame from the start of the loop.
    start: Duration,
}

/// Every frame of an animation, composited to full size.
pub struct FrameSequence {
    frames: Vec<SequenceFrame>,
    duration: Duration,
}

impl FrameSequence {
    /// Decode the whole GIF at `path`.
    pub fn open(path: &Path) -> eyre::Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open {}", path.display()))?;
        let decoder =
            GifDecoder::new(BufReader::new(file)).wrap_err("failed to read GIF header")?;

        let sequence = Self::from_frames(decoder.into_frames())?;
        debug!(
            path = %path.display(),
            frames = sequence.len(),
            duration_ms = sequence.duration.as_millis(),
            "GIF decoded"
        );

        Ok(sequence)
    }

    pub fn from_frames(frames: impl IntoIterator<Item = ImageResult<Frame>>) -> eyre::Result<Self> {
        let mut decoded = Vec::new();
        let mut start = Duration::ZERO;

        for (index, frame) in frames.into_iter().enumerate() {
            let frame = frame.wrap_err_with(|| format!("failed to decode frame {index}"))?;

            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = Duration::from_millis(u64::from(numer) / u64::from(denom.max(1)));
            let delay = if delay <= MIN_FRAME_DELAY {
                DEFAULT_FRAME_DELAY
            } else {
                delay
            };

            decoded.push(SequenceFrame {
                image: frame.into_buffer(),
                start,
            });
            start += delay;
        }

        if decoded.is_empty() {
            eyre::bail!("animation has no frames");
        }

        Ok(Self {
            frames: decoded,
            duration: start,
        })
    }

    /// Length of one loop of the animation.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Index of the frame shown at `position` within the loop.
    #[must_use]
    pub fn frame_index_at(&self, position: Duration) -> usize {
        self.frames
            .partition_point(|frame| frame.start <= position)
            .saturating_sub(1)
    }

    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&RgbaImage> {
        self.frames.get(index).map(|frame| &frame.image)
    }
}
