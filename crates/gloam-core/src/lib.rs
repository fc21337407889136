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

//! # Gloam Core
//!
//! Foundational crate containing the math primitives, entity identifiers and
//! interface contracts shared by the perception stack.
//!
//! Nothing in here knows about light sampling or sensors. Higher-level crates
//! implement the [`detectable::Detectable`] capability and consume the
//! [`physics::SpatialQuery`] contract without depending on a concrete scene.

#![warn(missing_docs)]

pub mod detectable;
pub mod entity;
pub mod error;
pub mod event;
pub mod layer;
pub mod math;
pub mod physics;

pub use detectable::{Detectable, DetectableRef};
pub use entity::EntityId;
pub use error::CoreError;
pub use layer::{Layer, LayerMask, LayerTable};
