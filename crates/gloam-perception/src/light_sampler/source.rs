// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Where a light sampler's pixels come from.

use crate::error::{PerceptionError, PerceptionResult};
use flume::{Receiver, Sender};
use gloam_core::math::LinearRgba;
use std::path::Path;

/// A flat, row-major image of linear colors.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleImage {
    width: u32,
    height: u32,
    pixels: Vec<LinearRgba>,
}

impl SampleImage {
    /// A fully transparent image of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, LinearRgba::TRANSPARENT)
    }

    /// An image where every pixel is `color`.
    pub fn filled(width: u32, height: u32, color: LinearRgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Builds an image from `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> LinearRgba) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total pixel count.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Whether the image has no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Flat index of `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// The pixel at `(x, y)`, if in bounds.
    pub fn get(&self, x: u32, y: u32) -> Option<LinearRgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[self.index(x, y)])
    }

    /// Overwrites the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: LinearRgba) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.pixels[index] = color;
        }
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[LinearRgba] {
        &self.pixels
    }

    /// All pixels, row-major, mutably.
    pub fn pixels_mut(&mut self) -> &mut [LinearRgba] {
        &mut self.pixels
    }
}

/// A provider of sample images, typically a small offscreen render target.
///
/// The sampler owns its source and calls it only from the coordinator side,
/// so implementations need to be `Send` but not `Sync`.
pub trait ImageSource: Send {
    /// Current `(width, height)` of the images this source produces.
    fn resolution(&self) -> (u32, u32);

    /// Writes the latest frame into `target`, which is sized to
    /// [`ImageSource::resolution`].
    fn capture(&mut self, target: &mut SampleImage);
}

/// A source that serves frames pushed from another thread.
///
/// The renderer keeps the [`FrameWriter`] half and publishes whenever it
/// finishes drawing the sample view; the sampler always captures the most
/// recent frame. Before the first publish every capture is fully transparent.
pub struct SharedImageSource {
    latest: SampleImage,
    frames: Receiver<SampleImage>,
}

/// The producer half of a [`SharedImageSource`].
#[derive(Clone)]
pub struct FrameWriter {
    width: u32,
    height: u32,
    frames: Sender<SampleImage>,
}

impl SharedImageSource {
    /// Creates a source of the given resolution and its writer.
    pub fn new(width: u32, height: u32) -> (Self, FrameWriter) {
        let (tx, rx) = flume::unbounded();
        let source = Self {
            latest: SampleImage::new(width, height),
            frames: rx,
        };
        let writer = FrameWriter {
            width,
            height,
            frames: tx,
        };
        (source, writer)
    }
}

impl ImageSource for SharedImageSource {
    fn resolution(&self) -> (u32, u32) {
        self.latest.resolution()
    }

    fn capture(&mut self, target: &mut SampleImage) {
        if let Some(frame) = self.frames.try_iter().last() {
            self.latest = frame;
        }
        target.pixels_mut().copy_from_slice(self.latest.pixels());
    }
}

impl FrameWriter {
    /// Publishes a new frame.
    ///
    /// Frames must match the source resolution. Publishing after the source
    /// was dropped is a silent no-op.
    pub fn publish(&self, frame: SampleImage) -> PerceptionResult<()> {
        if frame.resolution() != (self.width, self.height) {
            return Err(PerceptionError::ResolutionMismatch {
                width: self.width,
                height: self.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        if self.frames.send(frame).is_err() {
            log::debug!("Dropping frame: image source is gone.");
        }
        Ok(())
    }
}

/// A static source backed by an 8-bit RGBA image, e.g. a baked light probe.
pub struct ImageBufferSource {
    image: image::RgbaImage,
}

impl ImageBufferSource {
    /// Wraps an already decoded image.
    pub fn new(image: image::RgbaImage) -> Self {
        Self { image }
    }

    /// Decodes an image file.
    pub fn open(path: impl AsRef<Path>) -> PerceptionResult<Self> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self::new(image))
    }
}

impl ImageSource for ImageBufferSource {
    fn resolution(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn capture(&mut self, target: &mut SampleImage) {
        for (x, y, pixel) in self.image.enumerate_pixels() {
            target.set(x, y, LinearRgba::from_rgba8(pixel.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_indexing() {
        let image = SampleImage::from_fn(3, 2, |x, y| LinearRgba::grey((y * 3 + x) as f32));
        assert_eq!(image.index(2, 1), 5);
        assert_eq!(image.get(2, 1), Some(LinearRgba::grey(5.0)));
        assert_eq!(image.pixels()[4], LinearRgba::grey(4.0));
        assert_eq!(image.get(3, 0), None);
    }

    #[test]
    fn test_shared_source_serves_latest_frame() {
        let (mut source, writer) = SharedImageSource::new(2, 2);
        let mut target = SampleImage::new(2, 2);

        source.capture(&mut target);
        assert!(target.pixels().iter().all(|p| p.a == 0.0));

        writer
            .publish(SampleImage::filled(2, 2, LinearRgba::BLACK))
            .unwrap();
        writer
            .publish(SampleImage::filled(2, 2, LinearRgba::WHITE))
            .unwrap();
        source.capture(&mut target);
        assert!(target.pixels().iter().all(|p| *p == LinearRgba::WHITE));

        // No new frame: the last one is served again.
        source.capture(&mut target);
        assert!(target.pixels().iter().all(|p| *p == LinearRgba::WHITE));
    }

    #[test]
    fn test_writer_rejects_wrong_size() {
        let (_source, writer) = SharedImageSource::new(4, 4);
        let result = writer.publish(SampleImage::new(4, 3));
        assert!(matches!(
            result,
            Err(PerceptionError::ResolutionMismatch {
                got_height: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_image_buffer_source_converts_pixels() {
        let mut image = image::RgbaImage::new(2, 1);
        image.put_pixel(1, 0, image::Rgba([255, 255, 255, 255]));
        let mut source = ImageBufferSource::new(image);
        assert_eq!(source.resolution(), (2, 1));

        let mut target = SampleImage::new(2, 1);
        source.capture(&mut target);
        assert_eq!(target.get(0, 0), Some(LinearRgba::TRANSPARENT));
        assert_eq!(target.get(1, 0), Some(LinearRgba::WHITE));
    }

    #[test]
    fn test_image_buffer_source_opens_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let source = ImageBufferSource::open(&path).unwrap();
        assert_eq!(source.resolution(), (4, 2));
    }
}
