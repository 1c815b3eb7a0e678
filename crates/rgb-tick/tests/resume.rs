//! Integration tests for rollback-and-resume through the tick driver.

use rand::Rng;
use rgb_ecs::{ComponentId, SimRng, World};
use rgb_replay::RecordingWorld;
use rgb_tick::{TickConfig, TickDriver};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Energy(i64);

fn world(seed: u64) -> World {
    let mut world = World::new();
    world
        .register_with_id::<Energy>(ComponentId::from_raw(1))
        .unwrap();
    world.insert_rng(SimRng::from_state(seed));
    world
}

fn step(rec: &mut RecordingWorld<'_>) {
    let Some(rng) = rec.rng() else {
        return;
    };
    let spawn = rng.gen_bool(0.6);
    let drain = rng.gen_range(1..5i64);

    if spawn {
        let e = rec.spawn(true);
        rec.insert(e, Energy(10));
    }

    let alive: Vec<_> = rec.world().entities().collect();
    for e in alive {
        let Some(Energy(left)) = rec.world().get::<Energy>(e) else {
            continue;
        };
        if left <= drain {
            rec.despawn(e);
        } else {
            rec.insert(e, Energy(left - drain));
        }
    }
}

fn config() -> TickConfig {
    TickConfig {
        checkpoint_interval: 8,
        checkpoint_capacity: 4,
    }
}

#[test]
fn test_resume_reproduces_original_run() {
    let mut live = world(17);
    let mut driver = TickDriver::new(config());
    for _ in 0..40 {
        driver.tick(&mut live, step).unwrap();
    }
    let original = driver.log().clone();
    let final_digest = live.content_digest();

    // Not on a checkpoint frame, so this goes through replay
    assert!(driver.rollback_to(&mut live, 27).unwrap());
    assert_eq!(driver.log().latest_frame(), 27);

    for _ in 27..40 {
        driver.tick(&mut live, step).unwrap();
    }
    assert!(rgb_replay::validate_replay(&original, driver.log()));
    assert_eq!(live.content_digest(), final_digest);
}

#[test]
fn test_rollback_behind_ring_fails() {
    let mut live = world(2);
    let mut driver = TickDriver::new(config());
    for _ in 0..64 {
        driver.tick(&mut live, step).unwrap();
    }

    // Capacity 4 with interval 8 keeps frames 40..=64
    let oldest = driver.checkpoints().checkpoints()[0].frame();
    assert_eq!(oldest, 40);
    assert!(!driver.rollback_to(&mut live, 20).unwrap());
    assert_eq!(live.frame(), 64);
    assert_eq!(driver.log().latest_frame(), 64);
}

#[test]
fn test_verify_after_resume() {
    let mut live = world(5);
    let mut driver = TickDriver::new(config());
    for _ in 0..20 {
        driver.tick(&mut live, step).unwrap();
    }
    assert!(driver.rollback_to(&mut live, 16).unwrap());
    for _ in 0..6 {
        driver.tick(&mut live, step).unwrap();
    }

    let mut fresh = World::with_registry(live.components().clone());
    assert!(driver.verify(&live, &mut fresh).unwrap());
}

#[test]
fn test_config_from_json() {
    let config: TickConfig =
        serde_json::from_str(r#"{"checkpoint_interval": 4, "checkpoint_capacity": 2}"#).unwrap();
    assert_eq!(config.checkpoint_interval, 4);
    assert_eq!(config.checkpoint_capacity, 2);
}
