// SPDX-License-Identifier: MPL-2.0

use crate::{
    scaler::{self, FitRect},
    surface::PixelFormat,
    wallpaper::WallpaperLayer,
};
use fast_image_resize as fr;
use image::{Rgba, RgbaImage};
use sctk::{
    reexports::client::protocol::wl_shm,
    shell::WaylandSurface,
    shm::slot::{Buffer, CreateBufferError, SlotPool},
};

const LETTERBOX: Rgba<u8> = Rgba([0, 0, 0, 0xFF]);

/// Paints frames fit-inside and centered, reusing the last scaled frame while
/// neither the frame nor the surface size changes.
pub struct FitPainter {
    resizer: fr::Resizer,
    cached: Option<ScaledFrame>,
}

struct ScaledFrame {
    key: u64,
    rect: FitRect,
    image: RgbaImage,
}

impl Default for FitPainter {
    fn default() -> Self {
        Self {
            resizer: fr::Resizer::new(),
            cached: None,
        }
    }
}

impl FitPainter {
    /// Paint `frame`, identified by `key`, into `buffer`.
    pub fn paint(
        &mut self,
        buffer: &mut RgbaImage,
        key: u64,
        frame: &RgbaImage,
    ) -> eyre::Result<()> {
        let (width, height) = buffer.dimensions();
        if width == 0 || height == 0 {
            eyre::bail!("cannot paint into an empty {width}x{height} buffer");
        }

        let rect = scaler::fit(frame.dimensions(), (width, height))
            .ok_or_else(|| eyre::eyre!("frame has no area"))?;

        let scaled = match self.cached.take() {
            Some(cached) if cached.key == key && cached.rect == rect => cached,
            _ => ScaledFrame {
                key,
                rect,
                image: scaler::resize(&mut self.resizer, frame, rect.width, rect.height)?,
            },
        };

        for pixel in buffer.pixels_mut() {
            *pixel = LETTERBOX;
        }
        image::imageops::replace(
            buffer,
            &scaled.image,
            i64::from(rect.x),
            i64::from(rect.y),
        );

        self.cached = Some(scaled);
        Ok(())
    }

    /// Forget the cached scaled frame.
    pub fn reset(&mut self) {
        self.cached = None;
    }
}

/// Copies `image` into a new shm buffer from `pool`.
pub fn canvas(
    pool: &mut SlotPool,
    image: &RgbaImage,
    format: PixelFormat,
) -> Result<Buffer, CreateBufferError> {
    let (width, height) = image.dimensions();
    let stride = width as i32 * 4;

    let (buffer, canvas) = pool.create_buffer(
        width as i32,
        height as i32,
        stride,
        match format {
            PixelFormat::Rgba8888 => wl_shm::Format::Argb8888,
            PixelFormat::Opaque => wl_shm::Format::Xrgb8888,
        },
    )?;

    match format {
        PixelFormat::Rgba8888 => argb8888_canvas(canvas, image),
        PixelFormat::Opaque => xrgb8888_canvas(canvas, image),
    }

    Ok(buffer)
}

pub fn layer_surface(layer: &WallpaperLayer, buffer: &Buffer, buffer_damage: (i32, i32)) {
    let wl_surface = layer.layer.wl_surface();

    // Damage the entire window
    wl_surface.damage_buffer(0, 0, buffer_damage.0, buffer_damage.1);

    // Attach and commit to present.
    if let Err(why) = buffer.attach_to(wl_surface) {
        tracing::error!(?why, "buffer attachment failed");
    }

    wl_surface.commit();
}

/// Draws the image on an 8-bit canvas, ignoring alpha.
pub fn xrgb8888_canvas(canvas: &mut [u8], image: &RgbaImage) {
    for (dest, pixel) in canvas.chunks_exact_mut(4).zip(image.pixels()) {
        let [r, g, b, _] = pixel.0;

        let r = u32::from(r) << 16;
        let g = u32::from(g) << 8;
        let b = u32::from(b);

        dest.copy_from_slice(&(0xFF00_0000 | r | g | b).to_le_bytes());
    }
}

/// Draws the image on an 8-bit canvas with premultiplied alpha.
pub fn argb8888_canvas(canvas: &mut [u8], image: &RgbaImage) {
    let premultiply = |c: u8, a: u8| ((u32::from(c) * u32::from(a) + 127) / 255) as u8;

    for (dest, pixel) in canvas.chunks_exact_mut(4).zip(image.pixels()) {
        let [r, g, b, a] = pixel.0;

        let r = u32::from(premultiply(r, a)) << 16;
        let g = u32::from(premultiply(g, a)) << 8;
        let b = u32::from(premultiply(b, a));
        let a = u32::from(a) << 24;

        dest.copy_from_slice(&(a | r | g | b).to_le_bytes());
    }
}
