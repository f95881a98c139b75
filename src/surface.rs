// SPDX-License-Identifier: MPL-2.0

//! Drawing surface contract provided by the host.

use std::ops::{Deref, DerefMut};

use image::RgbaImage;

/// Pixel layout the host should present buffers with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// Alpha is ignored when presenting.
    #[default]
    Opaque,
    /// Full-alpha RGBA.
    Rgba8888,
}

/// A host surface that accepts exclusive, serialized frame submissions.
///
/// Every buffer returned by [`DrawSurface::acquire_buffer`] must be handed back
/// through [`DrawSurface::present`] exactly once. Use [`lock`] rather than
/// calling these directly.
pub trait DrawSurface {
    fn set_format(&mut self, format: PixelFormat);

    /// Returns a buffer sized to the surface, or `None` if the surface is not ready.
    fn acquire_buffer(&mut self) -> Option<RgbaImage>;

    /// Releases a buffer obtained from `acquire_buffer` and shows it.
    fn present(&mut self, buffer: RgbaImage);
}

/// Exclusive access to a surface buffer; presents it when dropped.
pub struct LockedBuffer<'s, S: DrawSurface + ?Sized> {
    surface: &'s mut S,
    buffer: RgbaImage,
}

/// Acquire the surface's backing buffer for painting.
pub fn lock<S: DrawSurface + ?Sized>(surface: &mut S) -> Option<LockedBuffer<'_, S>> {
    let buffer = surface.acquire_buffer()?;
    Some(LockedBuffer { surface, buffer })
}

impl<S: DrawSurface + ?Sized> Deref for LockedBuffer<'_, S> {
    type Target = RgbaImage;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl<S: DrawSurface + ?Sized> DerefMut for LockedBuffer<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl<S: DrawSurface + ?Sized> Drop for LockedBuffer<'_, S> {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.surface.present(buffer);
    }
}

/// A frame buffer kept between presents, reallocated only when the size changes.
#[derive(Debug, Default)]
pub struct SpareBuffer(Option<RgbaImage>);

impl SpareBuffer {
    /// A `width` x `height` buffer; its pixels are whatever was presented last.
    pub fn take(&mut self, width: u32, height: u32) -> RgbaImage {
        match self.0.take() {
            Some(buffer) if buffer.dimensions() == (width, height) => buffer,
            _ => RgbaImage::new(width, height),
        }
    }

    pub fn put_back(&mut self, buffer: RgbaImage) {
        self.0 = Some(buffer);
    }
}
