//! Air hockey simulation demo
//!
//! Builds a small table (four walls, a row of breakable bricks, two player
//! paddles and a puck) and runs the physics in real time, logging collisions.
//!
//! Usage: `airhockey-sim [config.json|-] [seconds] [seed]`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use airhockey_sim::consts::NANOS_PER_SECOND;
use airhockey_sim::sim::{
    CollisionListener, Disk, DiskDiskCollision, DiskId, DiskWallCollision, Driver,
    ListenerContext, Mass, SharedSimulation, Simulation, Vector2D, Wall,
};
use airhockey_sim::{PhysicsConfig, per_second_to_per_nano};

const TABLE_WIDTH: f64 = 20.0;
const TABLE_LENGTH: f64 = 40.0;
const PUCK_RADIUS: f64 = 0.8;
const PADDLE_RADIUS: f64 = 1.5;
/// Launch speed in units per second
const PUCK_SPEED: f64 = 25.0;
const BRICK_HITS: u32 = 3;

#[derive(Debug, Default)]
struct Stats {
    wall_hits: AtomicUsize,
    disk_hits: AtomicUsize,
    brick_hits: AtomicUsize,
}

/// Logs every collision and wears down bricks
struct CollisionLog {
    stats: Arc<Stats>,
}

impl CollisionListener for CollisionLog {
    fn disk_wall_collision(&mut self, collision: &DiskWallCollision, ctx: &mut ListenerContext<'_>) {
        log::debug!(
            "Disk {} hit wall {} at {:.3}s",
            collision.disk.0,
            collision.wall.0,
            collision.time as f64 / NANOS_PER_SECOND
        );
        self.stats.wall_hits.fetch_add(1, Ordering::Relaxed);

        if ctx.wall(collision.wall).is_some_and(|w| w.is_destroyable()) {
            self.stats.brick_hits.fetch_add(1, Ordering::Relaxed);
            ctx.hit_wall(collision.wall);
        }
    }

    fn disk_disk_collision(&mut self, collision: &DiskDiskCollision, ctx: &mut ListenerContext<'_>) {
        self.stats.disk_hits.fetch_add(1, Ordering::Relaxed);
        let player = ctx
            .disk(collision.disk2)
            .map(|d| d.last_hit_player())
            .unwrap_or(-1);
        log::info!(
            "Disk {} hit disk {} (last hit by player {})",
            collision.disk1.0,
            collision.disk2.0,
            player
        );
    }
}

/// Register walls, bricks, paddles and the puck; returns the puck
fn build_table(sim: &mut Simulation, rng: &mut Pcg32) -> DiskId {
    let (w, l) = (TABLE_WIDTH / 2.0, TABLE_LENGTH / 2.0);

    // counter-clockwise, so every normal points into the table
    sim.add_wall(Wall::segment(-w, -l, w, -l).infinite());
    sim.add_wall(Wall::segment(w, -l, w, l).infinite());
    sim.add_wall(Wall::segment(w, l, -w, l).infinite());
    sim.add_wall(Wall::segment(-w, l, -w, -l).infinite());

    for x in [-8.0, -2.0, 4.0] {
        sim.add_wall(Wall::segment(x, 0.0, x + 4.0, 0.0).destroyable(BRICK_HITS));
    }

    for (player, y) in [(0i16, -l + 4.0), (1, l - 4.0)] {
        let mut paddle = Disk::new(PADDLE_RADIUS, 0.5)
            .with_mass(Mass::Fixed)
            .at(0.0, y);
        paddle.set_last_hit_player(player);
        sim.add_disk(paddle, false);
    }

    let angle = rng.random_range(0.0..std::f64::consts::TAU);
    let speed = per_second_to_per_nano(PUCK_SPEED);
    let mut puck = Disk::new(PUCK_RADIUS, 0.2).at(0.0, -l / 2.0);
    puck.set_velocity(Vector2D::new(angle.cos(), angle.sin()) * speed);
    puck.motion_mut().set_acceleration(0.9995);
    sim.add_disk(puck, true)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) if path != "-" => PhysicsConfig::load(path),
        _ => PhysicsConfig::default(),
    };
    let seconds: f64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(5.0);
    let seed: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);

    log::info!("Air hockey simulation starting (seed {}, {}s)", seed, seconds);

    let mut rng = Pcg32::seed_from_u64(seed);
    let stats = Arc::new(Stats::default());

    let mut sim = Simulation::new(config.clone());
    let puck = build_table(&mut sim, &mut rng);
    sim.add_collision_listener(CollisionLog {
        stats: stats.clone(),
    });

    let shared = Arc::new(SharedSimulation::new(sim));
    let duration = Duration::from_secs_f64(seconds.max(0.0));

    match config.tick_period() {
        Some(period) => {
            let driver = match Driver::start(shared.clone(), period) {
                Ok(driver) => driver,
                Err(e) => {
                    log::error!("Failed to start simulation driver: {}", e);
                    std::process::exit(1);
                }
            };
            std::thread::sleep(duration);
            driver.stop();
        }
        None => {
            // uncapped: tick as often as this thread can
            let start = Instant::now();
            while start.elapsed() < duration {
                shared.update();
                std::thread::yield_now();
            }
        }
    }

    let mut snapshot = Vec::new();
    if let Err(e) = shared.write_simulation_update(&mut snapshot) {
        log::warn!("Snapshot failed: {}", e);
    }

    let sim = shared.lock();
    let bricks_left = sim.walls().iter().filter(|w| w.is_destroyable()).count();
    println!(
        "Simulated {:.3}s",
        sim.simulation_time() as f64 / NANOS_PER_SECOND
    );
    println!(
        "Collisions: {} wall, {} disk, {} brick hits ({} bricks left)",
        stats.wall_hits.load(Ordering::Relaxed),
        stats.disk_hits.load(Ordering::Relaxed),
        stats.brick_hits.load(Ordering::Relaxed),
        bricks_left
    );
    if let Some(disk) = sim.disk(puck) {
        println!("Puck: {}", disk);
    }
    println!("Snapshot: {} bytes", snapshot.len());
}
