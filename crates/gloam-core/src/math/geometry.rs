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

//! Geometric primitives for line-of-sight tests and sampler placement.

use serde::{Deserialize, Serialize};

use super::{Vec3, EPSILON};

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Used both as a collider shape and as the "visual bounds" a stealth rig
/// calibrates its light samplers around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a new `Aabb` from two corner points, in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a new `Aabb` from a center point and its half-extents.
    /// Negative half-extents are folded to positive ones.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Calculates the center point of the `Aabb`.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Calculates the half-extents (half the size on each axis) of the `Aabb`.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Checks if a point is inside or on the boundary of the `Aabb`.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point.x >= self.min.x && point.x <= self.max.x)
            && (point.y >= self.min.y && point.y <= self.max.y)
            && (point.z >= self.min.z && point.z <= self.max.z)
    }

    /// Returns a copy moved by `offset`.
    #[inline]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Returns the squared distance from `point` to the closest point of the box.
    pub fn distance_squared_to_point(&self, point: Vec3) -> f32 {
        let closest = point.max(self.min).min(self.max);
        (point - closest).length_squared()
    }
}

/// A half-line with an origin and a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Where the ray starts.
    pub origin: Vec3,
    /// Normalized direction of travel.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray; `direction` is normalized here.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Creates a ray starting at `from` and heading toward `to`.
    pub fn between(from: Vec3, to: Vec3) -> Self {
        Self::new(from, to - from)
    }

    /// Returns the point at parameter `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the first intersection with a sphere.
    ///
    /// A ray starting inside the sphere hits it at `t = 0`.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let c = oc.length_squared() - radius * radius;
        if c <= 0.0 {
            return Some(0.0);
        }
        let b = oc.dot(self.direction);
        if b > 0.0 {
            return None;
        }
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        Some(-b - discriminant.sqrt())
    }

    /// Distance along the ray to the first intersection with a box (slab test).
    ///
    /// A ray starting inside the box hits it at `t = 0`.
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        let origin = [self.origin.x, self.origin.y, self.origin.z];
        let dir = [self.direction.x, self.direction.y, self.direction.z];
        let lo = [aabb.min.x, aabb.min.y, aabb.min.z];
        let hi = [aabb.max.x, aabb.max.y, aabb.max.z];

        for axis in 0..3 {
            if dir[axis].abs() < EPSILON {
                if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[axis];
            let mut t0 = (lo[axis] - origin[axis]) * inv;
            let mut t1 = (hi[axis] - origin[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_center_and_extents() {
        let aabb = Aabb::from_min_max(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, -3.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(aabb.half_extents(), Vec3::new(1.0, 1.0, 3.0));
        assert!(aabb.contains_point(Vec3::ZERO));
    }

    #[test]
    fn test_ray_hits_sphere_in_front() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let t = ray.intersect_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0).unwrap();
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);
        assert!(ray.intersect_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0).is_none());
        assert!(ray.intersect_sphere(Vec3::new(3.0, 0.0, 5.0), 1.0).is_none());
    }

    #[test]
    fn test_ray_hits_box_slab() {
        let ray = Ray::between(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        let wall = Aabb::from_center_half_extents(Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.5, 2.0, 2.0));
        assert_relative_eq!(ray.intersect_aabb(&wall).unwrap(), 3.5, epsilon = 1e-5);

        let beside = wall.translated(Vec3::new(0.0, 0.0, 10.0));
        assert!(ray.intersect_aabb(&beside).is_none());
    }

    #[test]
    fn test_ray_origin_inside_box_hits_at_zero() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let aabb = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        assert_eq!(ray.intersect_aabb(&aabb), Some(0.0));
    }
}
