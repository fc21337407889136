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

//! Folds a character's light samplers into one visibility value.

use crate::config::StealthConfig;
use crate::error::{PerceptionError, PerceptionResult};
use crate::light_sampler::{LightSampler, SampleStatus, LIGHT_SAMPLING_LAYER};
use gloam_core::math::{Aabb, Vec3};
use gloam_core::{Detectable, EntityId, Layer, LayerTable};
use std::sync::{PoisonError, RwLock};

/// Name of the node grouping a character's samplers. Calibration resets its scale.
pub const STEALTH_RIG_NODE: &str = "Stealth Rig";

/// One node of a character's attachment hierarchy.
#[derive(Debug)]
pub struct RigNode {
    /// Node name.
    pub name: String,
    /// Local position relative to the parent node.
    pub position: Vec3,
    /// Local scale.
    pub scale: Vec3,
    /// Collision layer of the node.
    pub layer: Layer,
    /// The sampler attached to this node, if any.
    pub sampler: Option<LightSampler>,
    /// Child nodes.
    pub children: Vec<RigNode>,
}

impl RigNode {
    /// An empty node at the parent's origin with unit scale.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            layer: Layer::DEFAULT,
            sampler: None,
            children: Vec::new(),
        }
    }

    /// Sets the local position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the local scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Attaches a sampler to this node.
    pub fn with_sampler(mut self, sampler: LightSampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Appends a child node.
    pub fn with_child(mut self, child: RigNode) -> Self {
        self.children.push(child);
        self
    }

    /// Every sampler in this subtree, depth first.
    pub fn samplers(&self) -> Vec<&LightSampler> {
        let mut found = Vec::new();
        self.collect_samplers(&mut found);
        found
    }

    fn collect_samplers<'a>(&'a self, found: &mut Vec<&'a LightSampler>) {
        if let Some(sampler) = &self.sampler {
            found.push(sampler);
        }
        for child in &self.children {
            child.collect_samplers(found);
        }
    }

    /// The first node named `name` in this subtree, depth first.
    pub fn find(&self, name: &str) -> Option<&RigNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Moves sampler nodes and the nodes carrying them onto `layer`, and
    /// snaps every carrying node back onto its parent's origin.
    fn settle_samplers(&mut self, layer: Layer) {
        if self.sampler.is_some() {
            self.layer = layer;
        }
        if self.children.iter().any(|child| child.sampler.is_some()) {
            self.layer = layer;
            self.position = Vec3::ZERO;
        }
        for child in &mut self.children {
            child.settle_samplers(layer);
        }
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut RigNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(name))
    }
}

/// The [`Detectable`] side of a character: how lit it is and where it stands.
///
/// Setup (building the hierarchy, [`StealthRig::calibrate`]) takes `&mut self`.
/// Once shared as a [`gloam_core::DetectableRef`], the rig is driven through
/// `&self`: [`StealthRig::tick`] from the owner's update loop and
/// [`StealthRig::set_anchor`] whenever the character moves.
#[derive(Debug)]
pub struct StealthRig {
    entity: EntityId,
    tag: Option<String>,
    config: StealthConfig,
    hierarchy: RigNode,
    visual_bounds: Aabb,
    anchor: RwLock<Vec3>,
}

impl StealthRig {
    /// Wraps `hierarchy` for `entity`.
    ///
    /// Visual bounds default to a 1×2×1 box standing on the local origin.
    pub fn new(entity: EntityId, config: StealthConfig, hierarchy: RigNode) -> PerceptionResult<Self> {
        config.validate()?;
        Ok(Self {
            entity,
            tag: None,
            config,
            hierarchy,
            visual_bounds: Aabb::from_center_half_extents(
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.5, 1.0, 0.5),
            ),
            anchor: RwLock::new(Vec3::ZERO),
        })
    }

    /// Gives the character a tag sensors can filter on.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Normalization settings.
    pub fn config(&self) -> &StealthConfig {
        &self.config
    }

    /// The attachment hierarchy.
    pub fn hierarchy(&self) -> &RigNode {
        &self.hierarchy
    }

    /// Every attached sampler.
    pub fn samplers(&self) -> Vec<&LightSampler> {
        self.hierarchy.samplers()
    }

    /// How many samplers are attached.
    pub fn sampler_count(&self) -> usize {
        self.samplers().len()
    }

    /// The sampler named `name`.
    pub fn sampler(&self, name: &str) -> Option<&LightSampler> {
        self.samplers().into_iter().find(|sampler| sampler.name() == name)
    }

    /// Local box the samplers are calibrated around.
    pub fn visual_bounds(&self) -> Aabb {
        self.visual_bounds
    }

    /// Replaces the visual bounds. Takes effect at the next calibration.
    pub fn set_visual_bounds(&mut self, bounds: Aabb) {
        self.visual_bounds = bounds;
    }

    /// Moves the point sensors aim at.
    pub fn set_anchor(&self, anchor: Vec3) {
        *self.anchor.write().unwrap_or_else(PoisonError::into_inner) = anchor;
    }

    /// Normalized light level in `[0, 1]`.
    ///
    /// A rig without samplers is treated as fully exposed.
    pub fn visibility(&self) -> f32 {
        let samplers = self.samplers();
        if samplers.is_empty() {
            return 1.0;
        }
        let average =
            samplers.iter().map(|sampler| sampler.intensity()).sum::<f32>() / samplers.len() as f32;
        self.config.normalize(average)
    }

    /// Re-places every sampler around the visual bounds and resets the
    /// `"Stealth Rig"` node's scale. Returns how many samplers were placed.
    ///
    /// Fails before touching anything if samplers exist but the
    /// `"LightSampling"` layer does not.
    pub fn calibrate(&mut self, layers: &LayerTable) -> PerceptionResult<usize> {
        let count = self.sampler_count();
        if count > 0 {
            let light = layers
                .layer(LIGHT_SAMPLING_LAYER)
                .ok_or_else(|| PerceptionError::MissingLayer(LIGHT_SAMPLING_LAYER.to_string()))?;
            self.hierarchy.settle_samplers(light);
        }

        if let Some(node) = self.hierarchy.find_mut(STEALTH_RIG_NODE) {
            node.scale = Vec3::ONE;
        }

        for sampler in self.hierarchy.samplers() {
            sampler.calibrate(&self.visual_bounds, layers)?;
        }
        log::info!("Stealth rig {} calibrated {} light samplers.", self.entity, count);
        Ok(count)
    }

    /// Starts every sampler. If one fails, the ones already started are stopped again.
    pub fn activate(&self) -> PerceptionResult<()> {
        for sampler in self.samplers() {
            if let Err(error) = sampler.activate() {
                self.deactivate();
                return Err(error);
            }
        }
        Ok(())
    }

    /// Stops every sampler.
    pub fn deactivate(&self) {
        for sampler in self.samplers() {
            sampler.deactivate();
        }
    }

    /// Runs one coordinator step on every sampler, in hierarchy order.
    pub fn tick(&self) -> Vec<SampleStatus> {
        self.samplers().iter().map(|sampler| sampler.tick()).collect()
    }
}

impl Detectable for StealthRig {
    fn entity(&self) -> EntityId {
        self.entity
    }

    fn visibility(&self) -> f32 {
        StealthRig::visibility(self)
    }

    fn anchor(&self) -> Vec3 {
        *self.anchor.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_sampler::SharedImageSource;

    fn sampler(name: &str, position: Vec3) -> LightSampler {
        let (source, _writer) = SharedImageSource::new(2, 2);
        LightSampler::builder(name, EntityId::new(1))
            .source(source)
            .position(position)
            .build()
            .unwrap()
    }

    fn rig() -> StealthRig {
        let hierarchy = RigNode::new("Player").with_child(
            RigNode::new(STEALTH_RIG_NODE)
                .with_scale(Vec3::new(2.0, 2.0, 2.0))
                .with_child(RigNode::new("Head").with_sampler(sampler("head", Vec3::new(0.0, 3.0, 0.0))))
                .with_child(
                    RigNode::new("Torso")
                        .with_child(RigNode::new("Back").with_sampler(sampler("back", Vec3::new(0.0, 1.0, -4.0)))),
                ),
        );
        StealthRig::new(EntityId::new(1), StealthConfig::default(), hierarchy).unwrap()
    }

    #[test]
    fn test_no_samplers_means_fully_visible() {
        let rig = StealthRig::new(EntityId::new(2), StealthConfig::default(), RigNode::new("Crate")).unwrap();
        assert_eq!(rig.sampler_count(), 0);
        assert_eq!(rig.visibility(), 1.0);
    }

    #[test]
    fn test_unsampled_rig_is_hidden() {
        let rig = rig();
        assert_eq!(rig.sampler_count(), 2);
        assert_eq!(rig.visibility(), 0.0);
    }

    #[test]
    fn test_samplers_are_found_depth_first() {
        let rig = rig();
        let names: Vec<&str> = rig.samplers().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["head", "back"]);
        assert!(rig.sampler("back").is_some());
        assert!(rig.sampler("feet").is_none());
    }

    #[test]
    fn test_calibrate_without_layer_fails_untouched() {
        let mut rig = rig();
        let result = rig.calibrate(&LayerTable::new());
        assert!(matches!(result, Err(PerceptionError::MissingLayer(_))));
        assert_eq!(
            rig.hierarchy().find(STEALTH_RIG_NODE).unwrap().scale,
            Vec3::new(2.0, 2.0, 2.0)
        );
    }

    #[test]
    fn test_calibrate_without_samplers_needs_no_layer() {
        let mut rig = StealthRig::new(EntityId::new(2), StealthConfig::default(), RigNode::new("Crate")).unwrap();
        assert_eq!(rig.calibrate(&LayerTable::new()).unwrap(), 0);
    }

    #[test]
    fn test_calibrate_resets_scale_and_places_samplers() {
        let mut rig = rig();
        let mut layers = LayerTable::new();
        layers.register(LIGHT_SAMPLING_LAYER).unwrap();

        assert_eq!(rig.calibrate(&layers).unwrap(), 2);
        assert_eq!(rig.hierarchy().find(STEALTH_RIG_NODE).unwrap().scale, Vec3::ONE);

        let bounds = rig.visual_bounds();
        for sampler in rig.samplers() {
            let placement = sampler.placement();
            assert!(placement.position.y >= bounds.min.y - 1e-4);
            assert!(placement.position.y <= bounds.max.y + 1e-4);
            assert_eq!(placement.layer, layers.layer(LIGHT_SAMPLING_LAYER).unwrap());
        }
    }

    #[test]
    fn test_detectable_surface() {
        let rig = rig().with_tag("Player");
        rig.set_anchor(Vec3::new(1.0, 0.0, 2.0));
        let detectable: &dyn Detectable = &rig;
        assert_eq!(detectable.entity(), EntityId::new(1));
        assert_eq!(detectable.anchor(), Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(detectable.tag(), Some("Player"));
        assert_eq!(detectable.visibility(), 0.0);
    }

    #[test]
    fn test_inactive_rig_ticks_inactive() {
        let rig = rig();
        assert_eq!(rig.tick(), vec![SampleStatus::Inactive, SampleStatus::Inactive]);
    }
}
