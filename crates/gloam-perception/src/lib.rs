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

//! # Gloam Perception
//!
//! Decides what a guard can see.
//!
//! - [`LightSampler`] estimates how much light hits a point by analysing a
//!   small captured image on a pool of worker threads.
//! - [`StealthRig`] folds the samplers attached to a character into a single
//!   visibility scalar and implements [`gloam_core::Detectable`].
//! - [`Sensor`] tracks detectables in range, runs the field-of-view, light,
//!   tag and occlusion tests every cycle and publishes a
//!   [`VisibilityEvent`] on each transition.
//!
//! Data flows leaf to root: samplers feed the rig, the rig feeds every sensor
//! that has it in range, sensors feed the AI through an event channel.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod falloff;
pub mod light_sampler;
pub mod sensor;
pub mod stealth_rig;

pub use config::{LightSamplerConfig, PerceptionConfig, SensorConfig, StealthConfig};
pub use error::{PerceptionError, PerceptionResult};
pub use falloff::{FalloffCurve, FalloffKey};
pub use light_sampler::{
    CaptureVolume, FrameWriter, ImageBufferSource, ImageSource, LightSampler, LightSamplerBuilder,
    Placement, SampleImage, SampleStatus, SharedImageSource, LIGHT_SAMPLING_LAYER,
};
pub use sensor::{Sensor, VisibilityEvent};
pub use stealth_rig::{RigNode, StealthRig, STEALTH_RIG_NODE};
