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

use super::{ColliderDesc, ColliderHandle, ColliderShape, Overlap, RaycastHit, SpatialQuery};
use crate::layer::LayerMask;
use crate::math::{Aabb, Ray, Vec3};
use std::collections::BTreeMap;

/// A brute-force collision world of spheres and axis-aligned boxes.
///
/// Every query walks every collider. That is plenty for a handful of guards
/// and walls; a real scene plugs its own broad phase in behind
/// [`SpatialQuery`].
#[derive(Debug, Default)]
pub struct CollisionWorld {
    colliders: BTreeMap<ColliderHandle, ColliderDesc>,
    next_handle: u64,
}

impl CollisionWorld {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collider and returns its handle.
    pub fn add_collider(&mut self, desc: ColliderDesc) -> ColliderHandle {
        let handle = ColliderHandle(self.next_handle);
        self.next_handle += 1;
        self.colliders.insert(handle, desc);
        handle
    }

    /// Removes a collider. Unknown handles are ignored.
    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Option<ColliderDesc> {
        self.colliders.remove(&handle)
    }

    /// Moves a collider's center.
    pub fn set_position(&mut self, handle: ColliderHandle, position: Vec3) {
        if let Some(desc) = self.colliders.get_mut(&handle) {
            desc.position = position;
        }
    }

    /// Returns a collider's description.
    pub fn collider(&self, handle: ColliderHandle) -> Option<&ColliderDesc> {
        self.colliders.get(&handle)
    }

    /// Number of colliders in the world.
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// Returns `true` if the world holds no colliders.
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Lists every collider on `mask` touching the sphere at `center`.
    ///
    /// Triggers are included; callers that only care about solid bodies
    /// filter on [`Overlap::is_trigger`].
    pub fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<Overlap> {
        self.colliders
            .values()
            .filter(|desc| mask.contains(desc.layer))
            .filter(|desc| match desc.shape {
                ColliderShape::Sphere(r) => {
                    let reach = r + radius;
                    (desc.position - center).length_squared() <= reach * reach
                }
                ColliderShape::Box(half) => {
                    Aabb::from_center_half_extents(desc.position, half)
                        .distance_squared_to_point(center)
                        <= radius * radius
                }
            })
            .map(|desc| Overlap {
                entity: desc.entity,
                root: desc.root,
                is_trigger: desc.is_trigger,
            })
            .collect()
    }
}

// Colliders enclosing the ray origin never answer: an observer stands inside its own body.
fn contains_point(desc: &ColliderDesc, point: Vec3) -> bool {
    match desc.shape {
        ColliderShape::Sphere(r) => (point - desc.position).length_squared() < r * r,
        ColliderShape::Box(half) => {
            Aabb::from_center_half_extents(desc.position, half).contains_point(point)
        }
    }
}

impl SpatialQuery for CollisionWorld {
    fn cast_ray(&self, ray: &Ray, max_distance: f32, mask: LayerMask) -> Option<RaycastHit> {
        self.colliders
            .iter()
            .filter(|(_, desc)| !desc.is_trigger && mask.contains(desc.layer))
            .filter(|(_, desc)| !contains_point(desc, ray.origin))
            .filter_map(|(handle, desc)| {
                let t = match desc.shape {
                    ColliderShape::Sphere(r) => ray.intersect_sphere(desc.position, r),
                    ColliderShape::Box(half) => {
                        ray.intersect_aabb(&Aabb::from_center_half_extents(desc.position, half))
                    }
                }?;
                (t <= max_distance).then_some(RaycastHit {
                    entity: desc.entity,
                    root: desc.root,
                    collider: *handle,
                    distance: t,
                    point: ray.at(t),
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
