//! A small particle simulation driven entirely by the world RNG.

use rand::Rng;
use rgb_ecs::{ComponentId, EcsError, Entity, SimRng, World};
use rgb_replay::RecordingWorld;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

/// Frames left before the particle despawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifetime(pub u32);

const POSITION: ComponentId = ComponentId::from_raw(1);
const VELOCITY: ComponentId = ComponentId::from_raw(2);
const LIFETIME: ComponentId = ComponentId::from_raw(3);

/// A world with the demo components under fixed ids and a seeded RNG.
pub fn new_world(seed: u64) -> Result<World, EcsError> {
    let mut world = World::new();
    world.register_with_id::<Position>(POSITION)?;
    world.register_with_id::<Velocity>(VELOCITY)?;
    world.register_with_id::<Lifetime>(LIFETIME)?;
    world.insert_rng(SimRng::from_state(seed));
    Ok(world)
}

/// One simulation frame.
///
/// Spawns up to two particles, integrates enabled ones, ages everything and
/// occasionally toggles a particle off or on.
pub fn tick(rec: &mut RecordingWorld<'_>) {
    spawn_particles(rec);

    let alive: Vec<Entity> = rec.world().entities().collect();
    for &entity in &alive {
        integrate(rec, entity);
        age(rec, entity);
    }

    let Some(rng) = rec.rng() else {
        return;
    };
    if !alive.is_empty() && rng.gen_bool(0.05) {
        let entity = alive[rng.gen_range(0..alive.len())];
        let enabled = rec.world().is_enabled(entity);
        rec.set_enabled(entity, !enabled);
    }
}

fn spawn_particles(rec: &mut RecordingWorld<'_>) {
    let Some(rng) = rec.rng() else {
        return;
    };
    let count = rng.gen_range(0..=2);
    let particles: Vec<_> = (0..count)
        .map(|_| {
            (
                Position {
                    x: rng.gen_range(-50.0..50.0),
                    y: rng.gen_range(-50.0..50.0),
                },
                Velocity {
                    dx: rng.gen_range(-1.0..1.0),
                    dy: rng.gen_range(-1.0..1.0),
                },
                Lifetime(rng.gen_range(20..60)),
            )
        })
        .collect();

    for (position, velocity, lifetime) in particles {
        let entity = rec.spawn(true);
        rec.insert(entity, position);
        rec.insert(entity, velocity);
        rec.insert(entity, lifetime);
    }
}

fn integrate(rec: &mut RecordingWorld<'_>, entity: Entity) {
    let world = rec.world();
    if !world.is_enabled(entity) {
        return;
    }
    let (Some(position), Some(velocity)) = (world.get::<Position>(entity), world.get::<Velocity>(entity))
    else {
        return;
    };
    rec.insert(
        entity,
        Position {
            x: position.x + velocity.dx,
            y: position.y + velocity.dy,
        },
    );
}

fn age(rec: &mut RecordingWorld<'_>, entity: Entity) {
    match rec.world().get::<Lifetime>(entity) {
        Some(Lifetime(0 | 1)) => {
            rec.despawn(entity);
        }
        Some(Lifetime(left)) => {
            rec.insert(entity, Lifetime(left - 1));
        }
        None => {}
    }
}
