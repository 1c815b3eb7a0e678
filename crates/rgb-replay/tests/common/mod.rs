//! Shared deterministic simulation for integration tests.

#![allow(dead_code)]

use rand::{Rng, RngCore};
use rgb_ecs::{ComponentId, Entity, SimRng, World};
use rgb_replay::{CommandLog, Recorder, RecordingWorld};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: i32,
    pub dy: i32,
}

/// Float payload whose bits must survive every encode/decode path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mass(pub f64);

pub const POSITION: ComponentId = ComponentId::from_raw(1);
pub const VELOCITY: ComponentId = ComponentId::from_raw(2);
pub const MASS: ComponentId = ComponentId::from_raw(3);

/// A world with both test components under fixed ids and a seeded RNG.
pub fn new_world(seed: u64) -> World {
    let mut world = World::new();
    world.register_with_id::<Position>(POSITION).unwrap();
    world.register_with_id::<Velocity>(VELOCITY).unwrap();
    world.insert_rng(SimRng::from_state(seed));
    world
}

/// A world sharing the test component ids, without an RNG.
pub fn empty_world() -> World {
    let mut world = new_world(0);
    world.remove_rng();
    world
}

/// A world with only [`Mass`] registered and a seeded RNG.
pub fn mass_world(seed: u64) -> World {
    let mut world = World::new();
    world.register_with_id::<Mass>(MASS).unwrap();
    world.insert_rng(SimRng::from_state(seed));
    world
}

/// Spawn `count` entities carrying a mix of raw-bit and ordinary finite
/// `f64` masses drawn from the world RNG.
pub fn spawn_masses(rec: &mut RecordingWorld<'_>, count: usize) {
    for i in 0..count {
        let Some(rng) = rec.rng() else {
            return;
        };
        let value = if i % 2 == 0 {
            let bits = f64::from_bits(rng.next_u64());
            if bits.is_finite() { bits } else { 0.5 }
        } else {
            rng.gen_range(0.0..1000.0)
        };
        let e = rec.spawn(true);
        rec.insert(e, Mass(value));
    }
}

/// Mass bit patterns of every alive entity, in entity order.
pub fn mass_bits(world: &World) -> Vec<(Entity, u64)> {
    world
        .entities()
        .filter_map(|e| world.get::<Mass>(e).map(|Mass(m)| (e, m.to_bits())))
        .collect()
}

/// One frame of a small particle simulation driven by the world RNG.
///
/// With `allow_destroy` false, entities are never despawned.
pub fn step(rec: &mut RecordingWorld<'_>, allow_destroy: bool) {
    let Some(rng) = rec.rng() else {
        return;
    };
    let spawns = rng.gen_range(1..=3u32);
    let roll = rng.gen_range(0..100u32);
    let dx = rng.gen_range(-3..=3i32);

    for i in 0..spawns {
        let e = rec.spawn(roll % 7 != 0);
        rec.insert(e, Position { x: i as i32, y: roll as i32 });
        if i % 2 == 0 {
            rec.insert(e, Velocity { dx, dy: 1 });
        }
    }

    let alive: Vec<Entity> = rec.world().entities().collect();
    for &e in &alive {
        let (Some(pos), Some(vel)) = (rec.world().get::<Position>(e), rec.world().get::<Velocity>(e))
        else {
            continue;
        };
        rec.insert(
            e,
            Position {
                x: pos.x + vel.dx,
                y: pos.y + vel.dy,
            },
        );
    }

    if let Some(&e) = alive.get(roll as usize % alive.len().max(1)) {
        match roll % 4 {
            0 if allow_destroy => {
                rec.despawn(e);
            }
            1 => {
                let enabled = rec.world().is_enabled(e);
                rec.set_enabled(e, !enabled);
            }
            2 => {
                rec.remove::<Velocity>(e);
            }
            _ => {}
        }
    }
}

/// Drive `world` for `frames` frames, recording everything.
pub fn record(world: &mut World, frames: u64, allow_destroy: bool) -> CommandLog {
    let mut recorder = Recorder::new();
    recorder.start_recording();
    for _ in 0..frames {
        world.advance_frame();
        recorder.begin_frame();
        step(&mut RecordingWorld::new(world, &mut recorder), allow_destroy);
        recorder.end_frame(&*world);
    }
    recorder.export_log()
}
