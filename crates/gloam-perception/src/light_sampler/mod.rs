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

//! # Light Sampler
//!
//! Estimates how much light reaches a point by looking at a small captured
//! image of it. The capture is split into contiguous chunks scanned by
//! long-lived worker threads, while the owner's update loop acts as the
//! coordinator through [`LightSampler::tick`]: it never blocks, it only
//! aggregates once every worker has reported for the current generation.
//!
//! Anything physically touching the sampler (another character leaning on
//! the player, a door swinging shut) invalidates the capture. Those contacts
//! are reported through [`LightSampler::on_obstruction_entered`] and freeze
//! the reading until they clear.

mod pool;
mod source;

pub use self::source::{FrameWriter, ImageBufferSource, ImageSource, SampleImage, SharedImageSource};

use self::pool::{aggregate, lock, WorkerPool};
use crate::config::LightSamplerConfig;
use crate::error::{PerceptionError, PerceptionResult};
use gloam_core::math::{Aabb, Quat, Vec3, EPSILON};
use gloam_core::physics::Overlap;
use gloam_core::{EntityId, Layer, LayerTable};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Name of the layer calibrated samplers are moved to.
pub const LIGHT_SAMPLING_LAYER: &str = "LightSampling";

/// Outcome of one coordinator step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleStatus {
    /// The sampler has no running workers.
    Inactive,
    /// Something is touching the sampler; nothing was aggregated or refreshed.
    Obstructed,
    /// Some workers have not finished the current generation yet.
    Pending,
    /// Every chunk was fully transparent. The previous intensity is kept.
    NoData,
    /// A new intensity was computed.
    Sampled(f32),
}

/// Orthographic capture frustum of a sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureVolume {
    /// Half-height of the orthographic view.
    pub orthographic_size: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Default for CaptureVolume {
    fn default() -> Self {
        Self {
            orthographic_size: 1.0,
            near: 0.0,
            far: 1.0,
        }
    }
}

/// Local transform, layer and capture volume of a sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Position relative to the owning character.
    pub position: Vec3,
    /// Orientation; the capture looks along its forward axis.
    pub rotation: Quat,
    /// Local scale.
    pub scale: Vec3,
    /// Layer the sampler's collider lives on.
    pub layer: Layer,
    /// What the capture sees.
    pub capture: CaptureVolume,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            layer: Layer::DEFAULT,
            capture: CaptureVolume::default(),
        }
    }
}

/// Builds a [`LightSampler`]. An image source is mandatory.
pub struct LightSamplerBuilder {
    name: String,
    owner: EntityId,
    config: LightSamplerConfig,
    source: Option<Box<dyn ImageSource>>,
    placement: Placement,
}

impl LightSamplerBuilder {
    /// Sets the worker pool configuration.
    pub fn config(mut self, config: LightSamplerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the image source the sampler captures from.
    pub fn source(mut self, source: impl ImageSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Sets the initial local position.
    pub fn position(mut self, position: Vec3) -> Self {
        self.placement.position = position;
        self
    }

    /// Finishes the sampler.
    pub fn build(self) -> PerceptionResult<LightSampler> {
        let source = self
            .source
            .ok_or_else(|| PerceptionError::MissingImageSource(self.name.clone()))?;
        self.config.validate()?;

        Ok(LightSampler {
            name: self.name,
            owner: self.owner,
            config: self.config,
            source: Mutex::new(source),
            pool: Mutex::new(None),
            intensity: AtomicU32::new(0.0f32.to_bits()),
            obstructions: AtomicUsize::new(0),
            placement: Mutex::new(self.placement),
        })
    }
}

/// A light probe computing an intensity in the background.
pub struct LightSampler {
    name: String,
    owner: EntityId,
    config: LightSamplerConfig,
    source: Mutex<Box<dyn ImageSource>>,
    pool: Mutex<Option<WorkerPool>>,
    intensity: AtomicU32,
    obstructions: AtomicUsize,
    placement: Mutex<Placement>,
}

impl LightSampler {
    /// Starts building a sampler named `name`, owned by the hierarchy rooted at `owner`.
    pub fn builder(name: impl Into<String>, owner: EntityId) -> LightSamplerBuilder {
        LightSamplerBuilder {
            name: name.into(),
            owner,
            config: LightSamplerConfig::default(),
            source: None,
            placement: Placement::default(),
        }
    }

    /// The sampler's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root entity of the hierarchy the sampler belongs to.
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Worker pool configuration.
    pub fn config(&self) -> &LightSamplerConfig {
        &self.config
    }

    /// Captures the first frame and starts the workers. Does nothing if
    /// already active.
    pub fn activate(&self) -> PerceptionResult<()> {
        let mut pool = lock(&self.pool);
        if pool.is_some() {
            return Ok(());
        }

        let image = {
            let mut source = lock(&self.source);
            let (width, height) = source.resolution();
            let mut image = SampleImage::new(width, height);
            source.capture(&mut image);
            image
        };
        let resolution = image.resolution();

        *pool = Some(WorkerPool::spawn(
            &self.name,
            image,
            self.config.threads,
            self.config.poll_interval(),
        )?);
        log::info!(
            "Light sampler '{}' activated: {}x{} capture, {} workers.",
            self.name,
            resolution.0,
            resolution.1,
            self.config.threads
        );
        Ok(())
    }

    /// Stops and joins every worker. Does nothing if already inactive.
    pub fn deactivate(&self) {
        if let Some(pool) = lock(&self.pool).take() {
            drop(pool);
            log::info!("Light sampler '{}' deactivated.", self.name);
        }
    }

    /// Whether workers are running.
    pub fn is_active(&self) -> bool {
        lock(&self.pool).is_some()
    }

    /// One coordinator step. Never waits for the workers.
    pub fn tick(&self) -> SampleStatus {
        let pool = lock(&self.pool);
        let Some(pool) = pool.as_ref() else {
            return SampleStatus::Inactive;
        };

        if self.obstruction_count() > 0 {
            log::trace!("Light sampler '{}' is obstructed, skipping.", self.name);
            return SampleStatus::Obstructed;
        }

        let Some(readings) = pool.poll() else {
            return SampleStatus::Pending;
        };

        let status = match aggregate(&readings) {
            Some(intensity) => {
                self.intensity.store(intensity.to_bits(), Ordering::Release);
                SampleStatus::Sampled(intensity)
            }
            None => SampleStatus::NoData,
        };
        log::trace!("Light sampler '{}': {:?}", self.name, status);

        pool.release_next(|image| self.refresh(image));
        status
    }

    fn refresh(&self, image: &mut SampleImage) {
        let mut source = lock(&self.source);
        let resolution = source.resolution();
        if resolution != image.resolution() {
            log::warn!(
                "Light sampler '{}': source is now {}x{} but the buffer is {}x{}; keeping the old capture. Reactivate to resize.",
                self.name,
                resolution.0,
                resolution.1,
                image.width(),
                image.height()
            );
            return;
        }
        source.capture(image);
    }

    /// The last aggregated intensity. `0.0` until the first sample.
    pub fn intensity(&self) -> f32 {
        f32::from_bits(self.intensity.load(Ordering::Acquire))
    }

    /// Something started touching the sampler.
    ///
    /// Triggers and parts of the sampler's own hierarchy are ignored.
    pub fn on_obstruction_entered(&self, other: &Overlap) {
        if self.ignores(other) {
            return;
        }
        let count = self.obstructions.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("Light sampler '{}' obstructed ({} contacts).", self.name, count);
    }

    /// Something stopped touching the sampler.
    pub fn on_obstruction_exited(&self, other: &Overlap) {
        if self.ignores(other) {
            return;
        }
        let previous = self
            .obstructions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            log::debug!("Light sampler '{}' is clear.", self.name);
        }
    }

    fn ignores(&self, other: &Overlap) -> bool {
        other.is_trigger || other.root == self.owner
    }

    /// Number of foreign solid contacts currently touching the sampler.
    pub fn obstruction_count(&self) -> usize {
        self.obstructions.load(Ordering::Acquire)
    }

    /// Moves the sampler onto the surface of `bounds`.
    ///
    /// The sampler keeps its direction from the bounds' center (`+Z` if it
    /// sits exactly on it) and is pushed to the ellipsoid inscribed in the
    /// box, facing the center. Calibrating twice yields the same placement.
    pub fn calibrate(&self, bounds: &Aabb, layers: &LayerTable) -> PerceptionResult<Placement> {
        let layer = layers
            .layer(LIGHT_SAMPLING_LAYER)
            .ok_or_else(|| PerceptionError::MissingLayer(LIGHT_SAMPLING_LAYER.to_string()))?;

        let center = bounds.center();
        let half_extents = bounds.half_extents();

        let mut placement = lock(&self.placement);
        let mut direction = (placement.position - center).normalize();
        if direction == Vec3::ZERO {
            direction = Vec3::Z;
        }

        let position = center + direction * ellipsoid_radius(direction, half_extents);
        *placement = Placement {
            position,
            rotation: Quat::look_rotation(center - position),
            scale: Vec3::ONE,
            layer,
            capture: CaptureVolume {
                orthographic_size: half_extents.x,
                near: 0.0,
                far: half_extents.x,
            },
        };
        log::debug!("Light sampler '{}' calibrated: {:?}", self.name, *placement);
        Ok(*placement)
    }

    /// Current local placement.
    pub fn placement(&self) -> Placement {
        *lock(&self.placement)
    }

    /// Moves the sampler without calibrating.
    pub fn set_position(&self, position: Vec3) {
        lock(&self.placement).position = position;
    }

    /// Pixel ranges owned by each worker, empty while inactive.
    pub fn chunk_ranges(&self) -> Vec<Range<usize>> {
        lock(&self.pool)
            .as_ref()
            .map(|pool| pool.ranges().to_vec())
            .unwrap_or_default()
    }

    /// Number of running workers.
    pub fn worker_count(&self) -> usize {
        lock(&self.pool).as_ref().map_or(0, WorkerPool::worker_count)
    }
}

impl std::fmt::Debug for LightSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightSampler")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("intensity", &self.intensity())
            .field("obstructions", &self.obstruction_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Distance from the center to the inscribed ellipsoid along unit `direction`.
fn ellipsoid_radius(direction: Vec3, half_extents: Vec3) -> f32 {
    let axis = |d: f32, h: f32| {
        if d.abs() < EPSILON {
            0.0
        } else if h < EPSILON {
            f32::INFINITY
        } else {
            (d / h) * (d / h)
        }
    };
    let sum = axis(direction.x, half_extents.x)
        + axis(direction.y, half_extents.y)
        + axis(direction.z, half_extents.z);
    if sum.is_finite() && sum > 0.0 {
        1.0 / sum.sqrt()
    } else {
        0.0
    }
}
