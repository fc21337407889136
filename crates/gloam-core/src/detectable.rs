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

//! The capability an entity exposes to be noticed by sensors.

use crate::entity::EntityId;
use crate::math::Vec3;
use std::sync::Arc;

/// Interface contract for anything a sensor can look for.
///
/// Sensors depend only on this trait, never on a concrete character type.
/// Implementors are shared between sensors, hence `Send + Sync` and
/// `&self` accessors.
pub trait Detectable: Send + Sync {
    /// The entity this capability belongs to. Ray hits are matched against it.
    fn entity(&self) -> EntityId;

    /// How exposed the entity currently is, in `[0, 1]`.
    fn visibility(&self) -> f32;

    /// World-space reference point, typically the center of the entity's bounds.
    fn anchor(&self) -> Vec3;

    /// Categorical tag of the entity, if any.
    fn tag(&self) -> Option<&str> {
        None
    }
}

/// Shared handle to a detectable entity.
pub type DetectableRef = Arc<dyn Detectable>;
