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

//! # Spatial Query Abstractions
//!
//! The perception stack never owns a physics engine. It asks a
//! [`SpatialQuery`] provider for occlusion rays and receives overlap events
//! (as [`Overlap`] records) from whoever runs the broad phase.
//! [`CollisionWorld`] is a small analytic provider good enough for demos and
//! tests.

mod world;

pub use self::world::CollisionWorld;

use crate::entity::EntityId;
use crate::layer::{Layer, LayerMask};
use crate::math::{Ray, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a collider in a [`CollisionWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderHandle(pub u64);

/// Supported collider shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    /// Box with half-extents, axis aligned.
    Box(Vec3),
    /// Sphere with radius.
    Sphere(f32),
}

/// Description for creating a collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderDesc {
    /// The entity the collider belongs to.
    pub entity: EntityId,
    /// The root of that entity's hierarchy.
    pub root: EntityId,
    /// Layer the collider lives on.
    pub layer: Layer,
    /// Shape of the collider.
    pub shape: ColliderShape,
    /// World-space center.
    pub position: Vec3,
    /// Trigger volumes report overlaps but never block rays.
    pub is_trigger: bool,
}

impl ColliderDesc {
    /// A solid collider on the default layer, rooted at its own entity.
    pub fn solid(entity: EntityId, shape: ColliderShape, position: Vec3) -> Self {
        Self {
            entity,
            root: entity,
            layer: Layer::DEFAULT,
            shape,
            position,
            is_trigger: false,
        }
    }

    /// Places the collider on `layer`.
    pub fn on_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    /// Attaches the collider under another hierarchy root.
    pub fn with_root(mut self, root: EntityId) -> Self {
        self.root = root;
        self
    }

    /// Turns the collider into a trigger volume.
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }
}

/// The first collider a ray ran into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// Entity owning the collider that was hit.
    pub entity: EntityId,
    /// Root of that entity's hierarchy.
    pub root: EntityId,
    /// The collider that was hit.
    pub collider: ColliderHandle,
    /// Distance from the ray origin.
    pub distance: f32,
    /// World-space hit point.
    pub point: Vec3,
}

/// One side of an overlap event, as seen by the volume that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    /// The entity whose collider touched the volume.
    pub entity: EntityId,
    /// Root of that entity's hierarchy.
    pub root: EntityId,
    /// Whether the touching collider is itself a trigger.
    pub is_trigger: bool,
}

/// Interface contract for anything able to answer line-of-sight queries.
pub trait SpatialQuery {
    /// Casts `ray` up to `max_distance`, considering only colliders on `mask`.
    ///
    /// Returns the closest solid hit, if any. Trigger volumes and colliders
    /// enclosing the ray origin never count as hits.
    fn cast_ray(&self, ray: &Ray, max_distance: f32, mask: LayerMask) -> Option<RaycastHit>;
}
