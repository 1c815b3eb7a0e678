//! Deterministic replay runner
//!
//! This binary:
//! 1. Records a seeded particle simulation through a `TickDriver`
//! 2. Persists the command log and reloads it
//! 3. Re-simulates from the same seed and checks the logs are identical
//! 4. Replays the log into a fresh world and compares it with the live one
//! 5. Rolls back to an earlier frame, checks it against a direct replay,
//!    then resumes and checks the run ends where it did the first time
//!
//! Configuration is read from the environment:
//! - `REPLAY_FRAMES` (default 120)
//! - `REPLAY_SEED` (default 42)
//! - `CHECKPOINT_INTERVAL` (default 10)
//! - `CHECKPOINT_CAPACITY` (default 8)
//! - `ROLLBACK_FRAME` (default half of `REPLAY_FRAMES`)
//! - `REPLAY_LOG_PATH` (default `replay-log.json`)

mod demo;

use std::{path::PathBuf, str::FromStr};

use eyre::{WrapErr, bail};
use rgb_ecs::World;
use rgb_replay::{CommandLog, Replayer, validate_replay};
use rgb_tick::{TickConfig, TickDriver};
use tracing::{info, warn};

#[derive(Debug)]
struct Settings {
    frames: u64,
    seed: u64,
    tick: TickConfig,
    rollback_frame: u64,
    log_path: PathBuf,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

impl Settings {
    fn from_env() -> Self {
        let frames = env_or("REPLAY_FRAMES", 120);
        let defaults = TickConfig::default();
        Self {
            frames,
            seed: env_or("REPLAY_SEED", rgb_ecs::DEFAULT_SEED),
            tick: TickConfig {
                checkpoint_interval: env_or("CHECKPOINT_INTERVAL", defaults.checkpoint_interval),
                checkpoint_capacity: env_or("CHECKPOINT_CAPACITY", defaults.checkpoint_capacity),
            },
            rollback_frame: env_or("ROLLBACK_FRAME", frames / 2),
            log_path: std::env::var("REPLAY_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("replay-log.json")),
        }
    }
}

fn record(settings: &Settings) -> eyre::Result<(World, TickDriver)> {
    let mut world = demo::new_world(settings.seed)?;
    let mut driver = TickDriver::new(settings.tick);
    for _ in 0..settings.frames {
        driver.tick(&mut world, demo::tick)?;
    }
    Ok((world, driver))
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rgb_replay_runner=info".parse()?)
                .add_directive("rgb_replay=info".parse()?)
                .add_directive("rgb_tick=info".parse()?),
        )
        .init();

    let settings = Settings::from_env();
    info!(?settings, "starting replay runner");

    if settings.frames == 0 {
        bail!("REPLAY_FRAMES must be at least 1");
    }
    if settings.rollback_frame == 0 || settings.rollback_frame > settings.frames {
        bail!(
            "ROLLBACK_FRAME must be within 1..={}, got {}",
            settings.frames,
            settings.rollback_frame
        );
    }

    // Record
    let (mut world, mut driver) = record(&settings)?;
    let live_digest = world.content_digest();
    info!(
        frame = world.frame(),
        entities = world.entity_count(),
        batches = driver.log().len(),
        ops = driver.log().total_ops(),
        digest = format!("{live_digest:016x}"),
        "simulation recorded"
    );

    // Persist and reload
    driver
        .log()
        .save(&settings.log_path)
        .wrap_err_with(|| format!("writing {}", settings.log_path.display()))?;
    let reloaded = CommandLog::open(&settings.log_path)
        .wrap_err_with(|| format!("reading {}", settings.log_path.display()))?;
    if !validate_replay(driver.log(), &reloaded) {
        bail!("log changed on its way through {}", settings.log_path.display());
    }
    info!(path = %settings.log_path.display(), "log persisted and reloaded");

    // Re-simulate
    let (_, second) = record(&settings)?;
    if !validate_replay(driver.log(), second.log()) {
        bail!("re-simulation with seed {} diverged", settings.seed);
    }
    info!("re-simulation produced an identical log");

    // Replay into a fresh world
    let mut fresh = World::with_registry(world.components().clone());
    if !driver.verify(&world, &mut fresh)? {
        bail!("replayed world differs from the live world");
    }
    info!(entities = fresh.entity_count(), "replay matches live world");

    // Roll back, compare with a direct replay, then resume
    let target = settings.rollback_frame;
    let mut direct = World::with_registry(world.components().clone());
    let stats = Replayer::new(&mut direct).load_to_frame(&reloaded, target)?;

    if !driver.rollback_to(&mut world, target)? {
        bail!("no checkpoint at or before frame {target}");
    }
    if world.content_digest() != direct.content_digest() {
        bail!("rollback to frame {target} differs from a direct replay");
    }
    info!(frame = target, replayed = stats.frames_applied, "rollback matches direct replay");

    for _ in target..settings.frames {
        driver.tick(&mut world, demo::tick)?;
    }
    if world.content_digest() != live_digest {
        bail!("resumed run ended in a different state");
    }
    if !validate_replay(driver.log(), &reloaded) {
        bail!("resumed run recorded a different history");
    }
    info!(frame = world.frame(), "resumed run reproduced the original");

    let ring_debug = serde_json::to_string(&driver.checkpoints().debug_info())?;
    info!(checkpoints = %ring_debug, "checkpoint ring");

    Ok(())
}
