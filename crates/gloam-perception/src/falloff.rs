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

//! Distance to visibility-multiplier curves.

use crate::error::{PerceptionError, PerceptionResult};
use gloam_core::math::EPSILON;
use serde::{Deserialize, Serialize};

/// One `(distance, multiplier)` control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FalloffKey {
    /// Distance from the observer, in world units.
    pub distance: f32,
    /// Factor applied to a target's visibility at that distance.
    pub multiplier: f32,
}

/// A piecewise-linear curve mapping distance to a visibility multiplier.
///
/// Keys are kept sorted by distance. Outside the keyed domain the curve holds
/// the first/last multiplier. The last key's distance is the observer's
/// maximum sensory range.
///
/// ```
/// use gloam_perception::FalloffCurve;
/// let curve = FalloffCurve::new([(0.0, 1.0), (10.0, 0.0)]).unwrap();
/// assert_eq!(curve.evaluate(5.0), 0.5);
/// assert_eq!(curve.max_distance(), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FalloffKey>", into = "Vec<FalloffKey>")]
pub struct FalloffCurve {
    keys: Vec<FalloffKey>,
}

impl FalloffCurve {
    /// Builds a curve from `(distance, multiplier)` pairs in any order.
    pub fn new(keys: impl IntoIterator<Item = (f32, f32)>) -> PerceptionResult<Self> {
        keys.into_iter()
            .map(|(distance, multiplier)| FalloffKey {
                distance,
                multiplier,
            })
            .collect::<Vec<_>>()
            .try_into()
    }

    /// Samples the curve at `distance`.
    pub fn evaluate(&self, distance: f32) -> f32 {
        let next = self.keys.partition_point(|key| key.distance <= distance);
        if next == 0 {
            return self.keys[0].multiplier;
        }
        if next == self.keys.len() {
            return self.keys[next - 1].multiplier;
        }

        let lo = self.keys[next - 1];
        let hi = self.keys[next];
        let span = hi.distance - lo.distance;
        if span < EPSILON {
            return hi.multiplier;
        }
        let t = (distance - lo.distance) / span;
        lo.multiplier + (hi.multiplier - lo.multiplier) * t
    }

    /// Distance of the last key: how far the observer can sense at all.
    pub fn max_distance(&self) -> f32 {
        self.keys[self.keys.len() - 1].distance
    }

    /// The sorted control points.
    pub fn keys(&self) -> &[FalloffKey] {
        &self.keys
    }
}

impl TryFrom<Vec<FalloffKey>> for FalloffCurve {
    type Error = PerceptionError;

    fn try_from(mut keys: Vec<FalloffKey>) -> PerceptionResult<Self> {
        if keys.is_empty() {
            return Err(PerceptionError::EmptyFalloffCurve);
        }
        if let Some(bad) = keys
            .iter()
            .find(|key| !key.distance.is_finite() || !key.multiplier.is_finite())
        {
            return Err(PerceptionError::InvalidFalloffKey {
                distance: bad.distance,
                multiplier: bad.multiplier,
            });
        }
        keys.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(Self { keys })
    }
}

impl From<FalloffCurve> for Vec<FalloffKey> {
    fn from(curve: FalloffCurve) -> Self {
        curve.keys
    }
}

impl Default for FalloffCurve {
    /// Full multiplier up close, fading linearly to nothing at 20 units.
    fn default() -> Self {
        Self {
            keys: vec![
                FalloffKey {
                    distance: 0.0,
                    multiplier: 1.0,
                },
                FalloffKey {
                    distance: 20.0,
                    multiplier: 0.0,
                },
            ],
        }
    }
}
