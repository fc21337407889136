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

//! Error types for the perception subsystem.
//!
//! Everything here is a setup-time or usage failure. Transient runtime
//! conditions (an obstructed sampler, a chunk with no opaque pixels) are
//! reported through [`crate::SampleStatus`] instead.

use gloam_core::EntityId;
use thiserror::Error;

/// Errors raised while configuring or driving perception components.
#[derive(Debug, Error)]
pub enum PerceptionError {
    /// A light sampler was built without an image source to capture from.
    #[error("light sampler '{0}' has no image source; assign one before building it")]
    MissingImageSource(String),

    /// Calibration needs a layer the project does not define.
    #[error("unable to locate the '{0}' layer; register it in the layer table before calibrating")]
    MissingLayer(String),

    /// A falloff curve needs at least one key.
    #[error("falloff curve has no keys")]
    EmptyFalloffCurve,

    /// A falloff key holds NaN or infinity.
    #[error("falloff key ({distance}, {multiplier}) is not finite")]
    InvalidFalloffKey {
        /// Distance of the offending key.
        distance: f32,
        /// Multiplier of the offending key.
        multiplier: f32,
    },

    /// A configuration value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A published frame does not match the source's resolution.
    #[error("frame is {got_width}x{got_height}, source expects {width}x{height}")]
    ResolutionMismatch {
        /// Expected width.
        width: u32,
        /// Expected height.
        height: u32,
        /// Width of the rejected frame.
        got_width: u32,
        /// Height of the rejected frame.
        got_height: u32,
    },

    /// A visibility test was asked about an entity the sensor is not tracking.
    #[error("entity {0} is not in this sensor's range")]
    UnknownDetectable(EntityId),

    /// The OS refused to start a sampler worker thread.
    #[error("failed to spawn light sampler worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Reading or writing a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid JSON for the expected schema.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An image used as a capture source could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` for perception operations.
pub type PerceptionResult<T> = Result<T, PerceptionError>;
