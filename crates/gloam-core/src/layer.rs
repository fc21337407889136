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

//! Collision layers and masks.
//!
//! Every collider lives on exactly one [`Layer`]. Queries carry a
//! [`LayerMask`] selecting which layers may answer them; the occlusion test
//! of a sensor uses this to decide what kind of geometry blocks sight.
//! Layer names are resolved once, at composition time, through a
//! [`LayerTable`].

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One of the 32 collision layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Layer(u8);

impl Layer {
    /// Number of available layers.
    pub const COUNT: usize = 32;
    /// The layer everything lives on unless told otherwise.
    pub const DEFAULT: Layer = Layer(0);

    /// Creates a layer from its index, or `None` if out of range.
    pub fn from_index(index: u8) -> Option<Self> {
        ((index as usize) < Self::COUNT).then_some(Self(index))
    }

    /// The slot index of this layer.
    pub fn index(self) -> u8 {
        self.0
    }

    /// A mask selecting only this layer.
    pub fn mask(self) -> LayerMask {
        LayerMask(1 << self.0)
    }
}

/// A set of layers, one bit per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Selects nothing.
    pub const NONE: LayerMask = LayerMask(0);
    /// Selects every layer.
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    /// Returns `true` if `layer` is part of this mask.
    #[inline]
    pub fn contains(self, layer: Layer) -> bool {
        self.0 & (1 << layer.0) != 0
    }

    /// Returns this mask with `layer` added.
    #[inline]
    pub fn with(self, layer: Layer) -> Self {
        LayerMask(self.0 | (1 << layer.0))
    }

    /// Returns this mask with `layer` removed.
    #[inline]
    pub fn without(self, layer: Layer) -> Self {
        LayerMask(self.0 & !(1 << layer.0))
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Maps layer names to slots.
#[derive(Debug, Clone)]
pub struct LayerTable {
    names: HashMap<String, Layer>,
}

impl LayerTable {
    /// Name of the slot-zero layer present in every table.
    pub const DEFAULT_NAME: &'static str = "Default";

    /// Creates a table holding only the `"Default"` layer.
    pub fn new() -> Self {
        let mut names = HashMap::new();
        names.insert(Self::DEFAULT_NAME.to_string(), Layer::DEFAULT);
        Self { names }
    }

    /// Registers `name` on the next free slot.
    pub fn register(&mut self, name: impl Into<String>) -> Result<Layer, CoreError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(CoreError::DuplicateLayer(name));
        }
        let free = (0..Layer::COUNT as u8)
            .filter_map(Layer::from_index)
            .find(|candidate| !self.names.values().any(|used| used == candidate));
        match free {
            Some(layer) => {
                log::debug!("Registered layer '{}' at slot {}", name, layer.0);
                self.names.insert(name, layer);
                Ok(layer)
            }
            None => Err(CoreError::LayerTableFull {
                name,
                capacity: Layer::COUNT,
            }),
        }
    }

    /// Looks a layer up by name.
    pub fn layer(&self, name: &str) -> Option<Layer> {
        self.names.get(name).copied()
    }

    /// Builds a mask from layer names; unknown names are ignored.
    pub fn mask_of<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> LayerMask {
        names
            .into_iter()
            .filter_map(|name| self.layer(name))
            .fold(LayerMask::NONE, LayerMask::with)
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_next_free_slot() {
        let mut table = LayerTable::new();
        let walls = table.register("Walls").unwrap();
        let light = table.register("LightSampling").unwrap();
        assert_eq!(walls.index(), 1);
        assert_eq!(light.index(), 2);
        assert_eq!(table.layer("Walls"), Some(walls));
        assert_eq!(table.layer("Nope"), None);
    }

    #[test]
    fn test_from_index_bounds() {
        assert_eq!(Layer::from_index(0), Some(Layer::DEFAULT));
        assert_eq!(Layer::from_index(31).map(Layer::index), Some(31));
        assert_eq!(Layer::from_index(32), None);
    }

    #[test]
    fn test_duplicate_layer_is_rejected() {
        let mut table = LayerTable::new();
        table.register("Walls").unwrap();
        assert_eq!(
            table.register("Walls"),
            Err(CoreError::DuplicateLayer("Walls".to_string()))
        );
    }

    #[test]
    fn test_table_full() {
        let mut table = LayerTable::new();
        for i in 1..Layer::COUNT {
            table.register(format!("layer{i}")).unwrap();
        }
        assert!(matches!(
            table.register("overflow"),
            Err(CoreError::LayerTableFull { .. })
        ));
    }

    #[test]
    fn test_mask_membership() {
        let mut table = LayerTable::new();
        let walls = table.register("Walls").unwrap();
        let glass = table.register("Glass").unwrap();
        let mask = table.mask_of(["Default", "Walls"]);
        assert!(mask.contains(Layer::DEFAULT));
        assert!(mask.contains(walls));
        assert!(!mask.contains(glass));
        assert!(!mask.without(walls).contains(walls));
    }
}
