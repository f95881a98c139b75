// SPDX-License-Identifier: MPL-2.0

//! Aspect-preserving fit of a frame inside a surface.

use eyre::WrapErr;
use fast_image_resize as fr;
use image::RgbaImage;

/// Placement of a scaled frame within a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale `frame` uniformly by `min(sw / fw, sh / fh)` and center it in `surface`.
///
/// Returns `None` when either side has no area.
#[must_use]
pub fn fit(frame: (u32, u32), surface: (u32, u32)) -> Option<FitRect> {
    let ((w, h), (layer_width, layer_height)) = (frame, surface);
    if w == 0 || h == 0 || layer_width == 0 || layer_height == 0 {
        return None;
    }

    let ratio = (layer_width as f64 / w as f64).min(layer_height as f64 / h as f64);

    let (new_width, new_height) = (
        ((w as f64 * ratio).round() as u32).clamp(1, layer_width),
        ((h as f64 * ratio).round() as u32).clamp(1, layer_height),
    );

    Some(FitRect {
        x: (layer_width - new_width) / 2,
        y: (layer_height - new_height) / 2,
        width: new_width,
        height: new_height,
    })
}

/// Resample `frame` to exactly `width` x `height`.
pub fn resize(
    resizer: &mut fr::Resizer,
    frame: &RgbaImage,
    width: u32,
    height: u32,
) -> eyre::Result<RgbaImage> {
    if frame.dimensions() == (width, height) {
        return Ok(frame.clone());
    }

    let src = fr::images::ImageRef::new(
        frame.width(),
        frame.height(),
        frame.as_raw(),
        fr::PixelType::U8x4,
    )
    .wrap_err("invalid source frame")?;

    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    resizer
        .resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .wrap_err("failed to resize frame")?;

    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| eyre::eyre!("resized frame has an unexpected length"))
}
