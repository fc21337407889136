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

// Gloam Sandbox
// A guard watches a player cross a room while the lamp slowly dies.
//
// Usage: sandbox [perception.json]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use gloam_core::event::EventBus;
use gloam_core::math::{LinearRgba, Vec3};
use gloam_core::physics::{ColliderDesc, ColliderShape, CollisionWorld};
use gloam_core::{EntityId, LayerMask, LayerTable};
use gloam_perception::{
    LightSampler, PerceptionConfig, RigNode, SampleImage, Sensor, SharedImageSource, StealthRig,
    VisibilityEvent, LIGHT_SAMPLING_LAYER, STEALTH_RIG_NODE,
};

const GUARD: EntityId = EntityId::new(1);
const PLAYER: EntityId = EntityId::new(2);
const PLAYER_HEAD: EntityId = EntityId::new(3);
const PILLAR: EntityId = EntityId::new(4);

const FRAMES: u32 = 240;
const FRAME_TIME: Duration = Duration::from_millis(16);
const PROBE_SIZE: u32 = 16;
const HEAD_OFFSET: Vec3 = Vec3::new(0.0, 1.1, 0.0);

fn load_config() -> Result<PerceptionConfig> {
    match std::env::args().nth(1) {
        Some(path) => PerceptionConfig::from_file(&path)
            .with_context(|| format!("Failed to load perception config from '{path}'")),
        None => {
            let mut config = PerceptionConfig::default();
            // The room is lit by a single weak lamp.
            config.stealth.stealth_multiplier = 1.5;
            Ok(config)
        }
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = load_config()?;

    let mut layers = LayerTable::new();
    let walls = layers.register("Walls")?;
    layers.register(LIGHT_SAMPLING_LAYER)?;

    // --- Player ---
    // The "renderer" keeps the writer and pushes a probe frame every tick.
    let (probe, lamp) = SharedImageSource::new(PROBE_SIZE, PROBE_SIZE);
    let head = LightSampler::builder("head", PLAYER)
        .source(probe)
        .config(config.light_sampler.clone())
        .position(Vec3::new(0.0, 3.0, 0.0))
        .build()?;
    let mut rig = StealthRig::new(
        PLAYER,
        config.stealth.clone(),
        RigNode::new("Player")
            .with_child(RigNode::new(STEALTH_RIG_NODE).with_child(RigNode::new("Head").with_sampler(head))),
    )?
    .with_tag("Player");
    rig.calibrate(&layers)?;
    let player = Arc::new(rig);

    // --- Room ---
    let guard_position = Vec3::new(0.0, 1.0, 0.0);
    let mut world = CollisionWorld::new();
    world.add_collider(ColliderDesc::solid(GUARD, ColliderShape::Sphere(0.5), guard_position));
    let player_body = world.add_collider(ColliderDesc::solid(
        PLAYER,
        ColliderShape::Box(Vec3::new(0.3, 0.9, 0.3)),
        Vec3::new(-8.0, 1.0, 6.0),
    ));
    // A separate collider that still belongs to the player.
    let player_head = world.add_collider(
        ColliderDesc::solid(
            PLAYER_HEAD,
            ColliderShape::Sphere(0.2),
            Vec3::new(-8.0, 1.0, 6.0) + HEAD_OFFSET,
        )
        .with_root(PLAYER),
    );
    world.add_collider(
        ColliderDesc::solid(
            PILLAR,
            ColliderShape::Box(Vec3::new(0.4, 2.0, 0.4)),
            Vec3::new(2.0, 1.0, 4.0),
        )
        .on_layer(walls),
    );

    // --- Guard ---
    let bus = EventBus::new();
    let mut sensor = Sensor::new(GUARD, config.sensor.clone(), bus.sender())?;
    sensor.set_pose(guard_position, Vec3::Z);

    player.activate()?;
    let mut in_range = false;

    for frame in 0..FRAMES {
        let t = frame as f32 / FRAMES as f32;

        let position = Vec3::new(-8.0 + 16.0 * t, 1.0, 6.0);
        world.set_position(player_body, position);
        world.set_position(player_head, position + HEAD_OFFSET);
        player.set_anchor(position);

        let lamp_level = if t < 0.5 { 0.9 } else { 0.9 * (1.0 - (t - 0.5) * 2.0) };
        lamp.publish(SampleImage::filled(
            PROBE_SIZE,
            PROBE_SIZE,
            LinearRgba::grey(lamp_level),
        ))?;
        player.tick();

        let now_in_range = world
            .overlap_sphere(sensor.position(), sensor.sensory_range(), LayerMask::ALL)
            .iter()
            .any(|overlap| overlap.root == PLAYER);
        match (in_range, now_in_range) {
            (false, true) => sensor.on_entered_range(player.clone()),
            (true, false) => sensor.on_exited_range(PLAYER),
            _ => {}
        }
        in_range = now_in_range;

        sensor.evaluate(&world);
        for event in bus.drain() {
            match event {
                VisibilityEvent::ObjectVisible { target, .. } => log::info!(
                    "Frame {frame}: guard spotted {} (visibility {:.2}, lamp {:.2}).",
                    target.entity(),
                    target.visibility(),
                    lamp_level
                ),
                VisibilityEvent::ObjectInvisible { target, .. } => log::info!(
                    "Frame {frame}: guard lost {} (visibility {:.2}, lamp {:.2}).",
                    target.entity(),
                    target.visibility(),
                    lamp_level
                ),
            }
        }

        thread::sleep(FRAME_TIME);
    }

    player.deactivate();
    log::info!(
        "Done. Guard still sees {} target(s).",
        sensor.visible().count()
    );
    Ok(())
}
