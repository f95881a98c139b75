// SPDX-License-Identifier: MPL-2.0

//! Still frames for static wallpapers.

use std::path::Path;

use image::DynamicImage;
use tracing::{debug, warn};

use super::detection::is_video_file;

/// A still image for `path`: the first frame of a video or GIF, or the image itself.
///
/// Returns `None` when nothing could be decoded.
#[must_use]
pub fn extract(path: &Path) -> Option<DynamicImage> {
    let result = if is_video_file(path) {
        video_frame(path)
    } else {
        // GIFs decode to their first frame.
        decode_image(path)
    };

    match result {
        Ok(image) => {
            debug!(
                path = %path.display(),
                width = image.width(),
                height = image.height(),
                "extracted still frame"
            );
            Some(image)
        }
        Err(why) => {
            warn!(?why, path = %path.display(), "failed to extract still frame");
            None
        }
    }
}

fn decode_image(path: &Path) -> eyre::Result<DynamicImage> {
    Ok(image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?)
}

#[cfg(feature = "animated")]
fn video_frame(path: &Path) -> eyre::Result<DynamicImage> {
    use gstreamer::prelude::*;

    let (pipeline, appsink) = super::video_player::rgba_pipeline(path, "sync=false")?;
    let result = preroll_frame(&pipeline, &appsink);

    let _ = pipeline.set_state(gstreamer::State::Null);
    result
}

#[cfg(feature = "animated")]
fn preroll_frame(
    pipeline: &gstreamer::Pipeline,
    appsink: &gstreamer_app::AppSink,
) -> eyre::Result<DynamicImage> {
    use gstreamer::prelude::*;

    pipeline
        .set_state(gstreamer::State::Paused)
        .map_err(|e| eyre::eyre!("Failed to preroll pipeline: {:?}", e))?;

    let sample = appsink
        .try_pull_preroll(gstreamer::ClockTime::from_seconds(5))
        .ok_or_else(|| eyre::eyre!("no frame decoded within 5 seconds"))?;

    let frame = super::video_player::sample_to_frame(&sample)
        .ok_or_else(|| eyre::eyre!("unreadable video frame"))?;

    Ok(DynamicImage::ImageRgba8(frame.image))
}

#[cfg(not(feature = "animated"))]
fn video_frame(path: &Path) -> eyre::Result<DynamicImage> {
    eyre::bail!(
        "{} is a video, but video support was not compiled in",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animated::sequence::tests::write_gif;

    #[test]
    fn gif_yields_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.gif");
        write_gif(&path, &[([255, 0, 0, 255], 100), ([0, 0, 255, 255], 100)]);

        let still = extract(&path).unwrap().to_rgba8();
        assert_eq!(still.dimensions(), (4, 2));
        let [r, _, b, _] = still.get_pixel(0, 0).0;
        assert!(r > 200 && b < 50);
    }

    #[test]
    fn png_with_wrong_extension_is_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.dat");
        image::RgbaImage::from_pixel(3, 3, image::Rgba([0, 255, 0, 255]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let still = extract(&path).unwrap();
        assert_eq!((still.width(), still.height()), (3, 3));
    }

    #[test]
    fn undecodable_files_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text").unwrap();

        assert!(extract(&path).is_none());
        assert!(extract(&dir.path().join("missing.png")).is_none());
    }
}
