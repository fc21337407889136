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

//! # Sensor
//!
//! A guard's eyes. Range membership is pushed in from outside (whatever runs
//! the overlap volume sized by [`Sensor::sensory_range`]); every cycle
//! [`Sensor::evaluate`] re-tests each tracked target and publishes a
//! [`VisibilityEvent`] only when a target crosses the visible/invisible edge.
//!
//! A target is seen when, in order:
//!
//! 1. it lies within half the field of view of the sensor's forward axis,
//! 2. its visibility scaled by the distance falloff reaches the threshold,
//! 3. it carries none of the invisible tags,
//! 4. a ray toward it first hits the target itself.
//!
//! The first failing test ends the check, so the cheap tests shield the
//! more expensive ones.

use crate::config::SensorConfig;
use crate::error::{PerceptionError, PerceptionResult};
use flume::Sender;
use gloam_core::math::{Ray, Vec3};
use gloam_core::physics::SpatialQuery;
use gloam_core::{Detectable, DetectableRef, EntityId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Published whenever a target crosses the visibility edge of a sensor.
#[derive(Clone)]
pub enum VisibilityEvent {
    /// `target` just became visible to `observer`.
    ObjectVisible {
        /// The sensor's entity.
        observer: EntityId,
        /// The target that was spotted.
        target: DetectableRef,
    },
    /// `target` was visible to `observer` and no longer is.
    ObjectInvisible {
        /// The sensor's entity.
        observer: EntityId,
        /// The target that was lost.
        target: DetectableRef,
    },
}

impl VisibilityEvent {
    /// The sensor that raised the event.
    pub fn observer(&self) -> EntityId {
        match self {
            Self::ObjectVisible { observer, .. } | Self::ObjectInvisible { observer, .. } => *observer,
        }
    }

    /// The target the event is about.
    pub fn target(&self) -> &DetectableRef {
        match self {
            Self::ObjectVisible { target, .. } | Self::ObjectInvisible { target, .. } => target,
        }
    }

    /// Whether this is an [`VisibilityEvent::ObjectVisible`].
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::ObjectVisible { .. })
    }
}

impl fmt::Debug for VisibilityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.is_visible() {
            "ObjectVisible"
        } else {
            "ObjectInvisible"
        };
        f.debug_struct(name)
            .field("observer", &self.observer())
            .field("target", &self.target().entity())
            .finish()
    }
}

/// Field-of-view sensor owned by an observer entity.
pub struct Sensor {
    entity: EntityId,
    config: SensorConfig,
    events: Sender<VisibilityEvent>,
    position: Vec3,
    forward: Vec3,
    in_range: BTreeMap<EntityId, DetectableRef>,
    visible: BTreeSet<EntityId>,
    invisible: BTreeSet<EntityId>,
}

impl Sensor {
    /// Creates a sensor for `entity`, publishing transitions on `events`.
    pub fn new(
        entity: EntityId,
        config: SensorConfig,
        events: Sender<VisibilityEvent>,
    ) -> PerceptionResult<Self> {
        config.validate()?;
        log::debug!(
            "Sensor {} ready: fov {}°, range {}.",
            entity,
            config.field_of_view,
            config.falloff.max_distance()
        );
        Ok(Self {
            entity,
            config,
            events,
            position: Vec3::ZERO,
            forward: Vec3::Z,
            in_range: BTreeMap::new(),
            visible: BTreeSet::new(),
            invisible: BTreeSet::new(),
        })
    }

    /// The observer entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Current configuration.
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Updates the observer's world position and facing. A zero `forward`
    /// keeps the previous facing.
    pub fn set_pose(&mut self, position: Vec3, forward: Vec3) {
        self.position = position;
        let forward = forward.normalize();
        if forward != Vec3::ZERO {
            self.forward = forward;
        }
    }

    /// World position of the observer.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit forward axis of the observer.
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// How far the sensor can perceive: the last falloff key's distance.
    pub fn sensory_range(&self) -> f32 {
        self.config.falloff.max_distance()
    }

    /// Starts tracking `target`. It counts as invisible until the next
    /// evaluation spots it. Re-entering is a no-op.
    pub fn on_entered_range(&mut self, target: DetectableRef) {
        let id = target.entity();
        if self.in_range.contains_key(&id) {
            return;
        }
        self.in_range.insert(id, target);
        self.invisible.insert(id);
        log::debug!("Sensor {}: {} entered range.", self.entity, id);
    }

    /// Stops tracking `id`, raising `ObjectInvisible` first if it was visible.
    pub fn on_exited_range(&mut self, id: EntityId) {
        let Some(target) = self.in_range.remove(&id) else {
            return;
        };
        self.invisible.remove(&id);
        if self.visible.remove(&id) {
            self.publish(VisibilityEvent::ObjectInvisible {
                observer: self.entity,
                target,
            });
        }
        log::debug!("Sensor {}: {} left range.", self.entity, id);
    }

    /// Re-tests every tracked target and publishes edge transitions.
    pub fn evaluate(&mut self, scene: &dyn SpatialQuery) {
        let decisions: Vec<(EntityId, bool)> = self
            .in_range
            .iter()
            .map(|(id, target)| (*id, self.can_see(target.as_ref(), scene)))
            .collect();

        for (id, seen) in decisions {
            let Some(target) = self.in_range.get(&id).cloned() else {
                continue;
            };
            if seen && self.invisible.remove(&id) {
                self.visible.insert(id);
                log::debug!("Sensor {}: {} is now visible.", self.entity, id);
                self.publish(VisibilityEvent::ObjectVisible {
                    observer: self.entity,
                    target,
                });
            } else if !seen && self.visible.remove(&id) {
                self.invisible.insert(id);
                log::debug!("Sensor {}: {} is now invisible.", self.entity, id);
                self.publish(VisibilityEvent::ObjectInvisible {
                    observer: self.entity,
                    target,
                });
            }
        }
    }

    /// Runs the four visibility tests against `target`.
    pub fn can_see(&self, target: &dyn Detectable, scene: &dyn SpatialQuery) -> bool {
        let anchor = target.anchor();
        let to_target = anchor - self.position;

        let angle = self.forward.angle_between_degrees(to_target);
        if !(angle <= self.config.field_of_view * 0.5) {
            log::trace!("Sensor {}: {} outside fov ({angle:.1}°).", self.entity, target.entity());
            return false;
        }

        let distance = to_target.length();
        let score = target.visibility() * self.config.falloff.evaluate(distance);
        // A NaN score fails.
        if !(score >= self.config.min_visibility) {
            log::trace!("Sensor {}: {} too dim ({score:.3}).", self.entity, target.entity());
            return false;
        }

        if let Some(tag) = target.tag() {
            if self.config.invisible_tags.iter().any(|hidden| hidden == tag) {
                log::trace!("Sensor {}: {} ignored by tag '{tag}'.", self.entity, target.entity());
                return false;
            }
        }

        let ray = Ray::between(self.position, anchor);
        match scene.cast_ray(&ray, self.sensory_range(), self.config.occlusion_mask) {
            Some(hit) => {
                let own = hit.entity == target.entity() || hit.root == target.entity();
                if !own {
                    log::trace!("Sensor {}: {} occluded by {}.", self.entity, target.entity(), hit.entity);
                }
                own
            }
            None => false,
        }
    }

    /// [`Sensor::can_see`] for a target known only by id.
    pub fn can_see_tracked(&self, id: EntityId, scene: &dyn SpatialQuery) -> PerceptionResult<bool> {
        let target = self
            .in_range
            .get(&id)
            .ok_or(PerceptionError::UnknownDetectable(id))?;
        Ok(self.can_see(target.as_ref(), scene))
    }

    /// Whether `id` is currently visible.
    pub fn is_visible(&self, id: EntityId) -> bool {
        self.visible.contains(&id)
    }

    /// Whether `id` is currently tracked.
    pub fn is_in_range(&self, id: EntityId) -> bool {
        self.in_range.contains_key(&id)
    }

    /// Ids of the currently visible targets, in ascending order.
    pub fn visible(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.visible.iter().copied()
    }

    /// Ids of the tracked but unseen targets, in ascending order.
    pub fn invisible(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.invisible.iter().copied()
    }

    /// Number of tracked targets.
    pub fn in_range_count(&self) -> usize {
        self.in_range.len()
    }

    fn publish(&self, event: VisibilityEvent) {
        if let Err(e) = self.events.send(event) {
            log::error!("Sensor {}: failed to send visibility event: {e}.", self.entity);
        }
    }
}

impl fmt::Debug for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("entity", &self.entity)
            .field("position", &self.position)
            .field("forward", &self.forward)
            .field("visible", &self.visible)
            .field("invisible", &self.invisible)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::falloff::FalloffCurve;
    use gloam_core::layer::LayerMask;
    use gloam_core::physics::{ColliderHandle, RaycastHit};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Target {
        id: EntityId,
        position: Vec3,
        visibility: f32,
        tag: Option<String>,
        visibility_reads: AtomicUsize,
    }

    impl Target {
        fn at(index: u32, position: Vec3) -> Arc<Self> {
            Self::with(index, position, 1.0, None)
        }

        fn with(index: u32, position: Vec3, visibility: f32, tag: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                id: EntityId::new(index),
                position,
                visibility,
                tag: tag.map(str::to_string),
                visibility_reads: AtomicUsize::new(0),
            })
        }
    }

    impl Detectable for Target {
        fn entity(&self) -> EntityId {
            self.id
        }
        fn visibility(&self) -> f32 {
            self.visibility_reads.fetch_add(1, Ordering::SeqCst);
            self.visibility
        }
        fn anchor(&self) -> Vec3 {
            self.position
        }
        fn tag(&self) -> Option<&str> {
            self.tag.as_deref()
        }
    }

    /// Answers every ray with a fixed hit (or none) and counts the casts.
    struct Scene {
        hit: Option<EntityId>,
        casts: Cell<usize>,
    }

    impl Scene {
        fn hitting(id: EntityId) -> Self {
            Self {
                hit: Some(id),
                casts: Cell::new(0),
            }
        }

        fn empty() -> Self {
            Self {
                hit: None,
                casts: Cell::new(0),
            }
        }
    }

    impl SpatialQuery for Scene {
        fn cast_ray(&self, ray: &Ray, _max_distance: f32, _mask: LayerMask) -> Option<RaycastHit> {
            self.casts.set(self.casts.get() + 1);
            self.hit.map(|entity| RaycastHit {
                entity,
                root: entity,
                collider: ColliderHandle(0),
                distance: 1.0,
                point: ray.at(1.0),
            })
        }
    }

    fn sensor(config: SensorConfig) -> (Sensor, flume::Receiver<VisibilityEvent>) {
        let (tx, rx) = flume::unbounded();
        (Sensor::new(EntityId::new(100), config, tx).unwrap(), rx)
    }

    fn config() -> SensorConfig {
        SensorConfig {
            field_of_view: 110.0,
            min_visibility: 0.5,
            falloff: FalloffCurve::new([(0.0, 1.0), (10.0, 0.0)]).unwrap(),
            ..Default::default()
        }
    }

    fn assert_partition(sensor: &Sensor) {
        for id in sensor.in_range.keys() {
            assert!(sensor.visible.contains(id) ^ sensor.invisible.contains(id));
        }
        assert_eq!(sensor.visible.len() + sensor.invisible.len(), sensor.in_range.len());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (tx, _rx) = flume::unbounded();
        let result = Sensor::new(
            EntityId::new(1),
            SensorConfig {
                field_of_view: 0.0,
                ..Default::default()
            },
            tx,
        );
        assert!(matches!(result, Err(PerceptionError::InvalidConfig(_))));
    }

    #[test]
    fn test_entering_is_silent_and_invisible() {
        let (mut sensor, rx) = sensor(config());
        let target = Target::at(1, Vec3::new(0.0, 0.0, 2.0));
        sensor.on_entered_range(target.clone());
        sensor.on_entered_range(target);

        assert_eq!(sensor.in_range_count(), 1);
        assert!(!sensor.is_visible(EntityId::new(1)));
        assert_eq!(sensor.invisible().collect::<Vec<_>>(), vec![EntityId::new(1)]);
        assert!(rx.try_recv().is_err());
        assert_partition(&sensor);
    }

    #[test]
    fn test_visible_event_fires_once_per_edge() {
        let (mut sensor, rx) = sensor(config());
        let target = Target::at(1, Vec3::new(0.0, 0.0, 2.0));
        sensor.on_entered_range(target);
        let scene = Scene::hitting(EntityId::new(1));

        for _ in 0..5 {
            sensor.evaluate(&scene);
            assert_partition(&sensor);
        }
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_visible());
        assert_eq!(events[0].observer(), EntityId::new(100));
        assert_eq!(events[0].target().entity(), EntityId::new(1));
        assert!(sensor.is_visible(EntityId::new(1)));

        sensor.evaluate(&Scene::empty());
        sensor.evaluate(&Scene::empty());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_visible());
        assert_partition(&sensor);
    }

    #[test]
    fn test_angle_test_short_circuits() {
        let (sensor, _rx) = sensor(config());
        let behind = Target::at(1, Vec3::new(0.0, 0.0, -1.0));
        let scene = Scene::hitting(EntityId::new(1));

        assert!(!sensor.can_see(behind.as_ref(), &scene));
        assert_eq!(behind.visibility_reads.load(Ordering::SeqCst), 0);
        assert_eq!(scene.casts.get(), 0);
    }

    #[test]
    fn test_fov_edge() {
        let (sensor, _rx) = sensor(config());
        let scene = Scene::hitting(EntityId::new(1));
        let inside = Target::at(1, Vec3::new(50f32.to_radians().sin(), 0.0, 50f32.to_radians().cos()));
        let outside = Target::at(1, Vec3::new(60f32.to_radians().sin(), 0.0, 60f32.to_radians().cos()));
        assert!(sensor.can_see(inside.as_ref(), &scene));
        assert!(!sensor.can_see(outside.as_ref(), &scene));
    }

    #[test]
    fn test_falloff_score_gates_visibility() {
        let curve = FalloffCurve::new([(0.0, 1.0), (10.0, 0.5), (20.0, 0.0)]).unwrap();
        let target = Target::at(1, Vec3::new(0.0, 0.0, 15.0));
        let scene = Scene::hitting(EntityId::new(1));

        let (strict, _rx) = sensor(SensorConfig {
            min_visibility: 0.3,
            falloff: curve.clone(),
            ..config()
        });
        assert!(!strict.can_see(target.as_ref(), &scene));
        assert_eq!(scene.casts.get(), 0);

        let (lenient, _rx) = sensor(SensorConfig {
            min_visibility: 0.2,
            falloff: curve,
            ..config()
        });
        assert!(lenient.can_see(target.as_ref(), &scene));
    }

    #[test]
    fn test_dim_target_is_not_seen() {
        let (sensor, _rx) = sensor(config());
        let scene = Scene::hitting(EntityId::new(1));
        let dim = Target::with(1, Vec3::new(0.0, 0.0, 1.0), 0.3, None);
        assert!(!sensor.can_see(dim.as_ref(), &scene));
    }

    #[test]
    fn test_nan_visibility_is_not_seen() {
        let (sensor, _rx) = sensor(config());
        let scene = Scene::hitting(EntityId::new(1));
        let corrupt = Target::with(1, Vec3::new(0.0, 0.0, 5.0), f32::NAN, None);
        assert!(!sensor.can_see(corrupt.as_ref(), &scene));
        assert_eq!(scene.casts.get(), 0);
    }

    #[test]
    fn test_invisible_tag_vetoes() {
        let (sensor, _rx) = sensor(SensorConfig {
            invisible_tags: vec!["Ghost".to_string()],
            ..config()
        });
        let scene = Scene::hitting(EntityId::new(1));
        let ghost = Target::with(1, Vec3::new(0.0, 0.0, 1.0), 1.0, Some("Ghost"));
        let player = Target::with(1, Vec3::new(0.0, 0.0, 1.0), 1.0, Some("Player"));

        assert!(!sensor.can_see(ghost.as_ref(), &scene));
        assert_eq!(scene.casts.get(), 0);
        assert!(sensor.can_see(player.as_ref(), &scene));
    }

    #[test]
    fn test_occlusion() {
        let (sensor, _rx) = sensor(config());
        let target = Target::at(1, Vec3::new(0.0, 0.0, 3.0));
        assert!(!sensor.can_see(target.as_ref(), &Scene::hitting(EntityId::new(9))));
        assert!(!sensor.can_see(target.as_ref(), &Scene::empty()));
        assert!(sensor.can_see(target.as_ref(), &Scene::hitting(EntityId::new(1))));
    }

    #[test]
    fn test_exit_while_visible_raises_invisible() {
        let (mut sensor, rx) = sensor(config());
        sensor.on_entered_range(Target::at(1, Vec3::new(0.0, 0.0, 2.0)));
        sensor.on_entered_range(Target::at(2, Vec3::new(0.0, 0.0, -2.0)));
        sensor.evaluate(&Scene::hitting(EntityId::new(1)));
        assert_eq!(rx.try_iter().count(), 1);

        sensor.on_exited_range(EntityId::new(2));
        assert!(rx.try_recv().is_err());

        sensor.on_exited_range(EntityId::new(1));
        let event = rx.try_recv().unwrap();
        assert!(!event.is_visible());
        assert_eq!(event.target().entity(), EntityId::new(1));

        sensor.on_exited_range(EntityId::new(1));
        assert!(rx.try_recv().is_err());
        assert_eq!(sensor.in_range_count(), 0);
        assert_eq!(sensor.visible().count(), 0);
        assert_eq!(sensor.invisible().count(), 0);
    }

    #[test]
    fn test_can_see_tracked_requires_tracking() {
        let (mut sensor, _rx) = sensor(config());
        let scene = Scene::hitting(EntityId::new(1));
        assert!(matches!(
            sensor.can_see_tracked(EntityId::new(1), &scene),
            Err(PerceptionError::UnknownDetectable(id)) if id == EntityId::new(1)
        ));

        sensor.on_entered_range(Target::at(1, Vec3::new(0.0, 0.0, 2.0)));
        assert!(sensor.can_see_tracked(EntityId::new(1), &scene).unwrap());
    }

    #[test]
    fn test_pose_turns_the_view() {
        let (mut sensor, _rx) = sensor(config());
        let scene = Scene::hitting(EntityId::new(1));
        let target = Target::at(1, Vec3::new(5.0, 0.0, 0.0));
        assert!(!sensor.can_see(target.as_ref(), &scene));

        sensor.set_pose(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        assert!(sensor.can_see(target.as_ref(), &scene));

        sensor.set_pose(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO);
        assert_eq!(sensor.forward(), Vec3::X);
        assert_eq!(sensor.sensory_range(), 10.0);
    }
}
