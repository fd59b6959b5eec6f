//! Air hockey simulation core
//!
//! Core modules:
//! - `sim`: Continuous-time physics (disks, walls, collision search and response, tick loop)
//! - `settings`: Physics tunables (impulse loss, collision cap, sanity checks, tick rate)
//! - `wire`: Big-endian binary records for disks, snapshots and collision events

pub mod settings;
pub mod sim;
pub mod wire;

pub use settings::{ConfigError, PhysicsConfig};

/// Simulation constants
pub mod consts {
    /// Maximum allowed rounding error
    pub const EPSILON: f64 = 1e-14;

    /// Maximum speed of any moving object (units per ns)
    pub const MAX_VELOCITY_VALUE: f64 = 55.0 / 1_000_000_000.0;
    /// Extra drag for fast objects, only applied when acceleration != 1.0
    pub const HIGH_VELOCITY_FRICTION: f64 = 0.0015;

    /// Time-of-impact precision floor (ns)
    pub const MAX_COLLISION_TIME_ERROR: i64 = 5;
    /// Circuit breaker: resolved collisions per tick
    pub const MAX_COLLISIONS_PER_TICK: usize = 10;
    /// Velocity factor applied after every collision
    pub const DEFAULT_IMPULSE_LOSS: f64 = 0.9;
    /// Velocity factor for a fixed disk caught in a repeated contact
    pub const FIXED_DISK_TRAP_REBOUND: f64 = 0.4;
    /// Separation applied when overlapping disks are pushed apart
    pub const OVERLAP_PUSH_FACTOR: f64 = 1.001;
    /// Overlap slack accepted by the sanity check
    pub const SANITY_TOLERANCE: f64 = 1e-9;

    /// Disk defaults
    pub const DEFAULT_DISK_MASS: f64 = 0.1;

    /// Wall defaults
    pub const DEFAULT_WALL_THICKNESS: f64 = 0.2;
    pub const DEFAULT_WALL_HEIGHT: f64 = 1.0;

    /// Tick rate of the background driver
    pub const DEFAULT_TARGET_FPS: i32 = 100;

    pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
}

/// Convert a duration in seconds to simulation nanoseconds
#[inline]
pub fn secs_to_nanos(secs: f64) -> i64 {
    (secs * consts::NANOS_PER_SECOND).round() as i64
}

/// Convert a speed in units/s to simulation units/ns
#[inline]
pub fn per_second_to_per_nano(speed: f64) -> f64 {
    speed / consts::NANOS_PER_SECOND
}
