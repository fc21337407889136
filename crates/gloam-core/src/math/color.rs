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

//! Defines the `LinearRgba` pixel type read back from sampler captures.

/// Represents a color in a **linear RGBA** color space using `f32` components.
///
/// This is the element type of a light sampler's pixel buffer. Alpha carries
/// coverage: a fully transparent pixel means "nothing was rendered here",
/// not "this spot is black".
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LinearRgba {
    /// The red component in linear space.
    pub r: f32,
    /// The green component in linear space.
    pub g: f32,
    /// The blue component in linear space.
    pub b: f32,
    /// The alpha (coverage) component.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white (`[1.0, 1.0, 1.0, 1.0]`).
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black (`[0.0, 0.0, 0.0, 1.0]`).
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black (`[0.0, 0.0, 0.0, 0.0]`).
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new `LinearRgba` with explicit RGBA values.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque `LinearRgba` (alpha = 1.0).
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Creates an opaque grey of the given level.
    #[inline]
    pub const fn grey(level: f32) -> Self {
        Self::rgb(level, level, level)
    }

    /// Builds a color from 8-bit channels, normalized to `[0, 1]` without gamma correction.
    #[inline]
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self {
            r: rgba[0] as f32 / 255.0,
            g: rgba[1] as f32 / 255.0,
            b: rgba[2] as f32 / 255.0,
            a: rgba[3] as f32 / 255.0,
        }
    }

    /// The unweighted mean of the three color channels.
    #[inline]
    pub fn channel_average(&self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_channel_average() {
        assert_relative_eq!(LinearRgba::rgb(0.3, 0.6, 0.9).channel_average(), 0.6);
        assert_eq!(LinearRgba::TRANSPARENT.channel_average(), 0.0);
    }

    #[test]
    fn test_from_rgba8() {
        let c = LinearRgba::from_rgba8([255, 0, 51, 255]);
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 0.0);
        assert_relative_eq!(c.b, 0.2);
        assert_eq!(c.a, 1.0);
    }
}
