//! Kinematic state of moving objects and the disks built on it
//!
//! Motion is linear between updates: `position_at(t)` extrapolates from the
//! last committed position and timestamp using the current velocity.

use serde::{Deserialize, Serialize};

use super::vector::{Vector2D, VectorExt};
use crate::consts::*;

/// Stable disk index assigned by the simulation on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct DiskId(pub u32);

/// Linear moving object: position, velocity (units/ns), friction factor, timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingObject {
    position: Vector2D,
    velocity: Vector2D,
    /// Friction multiplier applied on every update (1.0 = none)
    acceleration: f64,
    timestamp_ns: i64,
}

impl Default for MovingObject {
    fn default() -> Self {
        Self {
            position: Vector2D::ZERO,
            velocity: Vector2D::ZERO,
            acceleration: 1.0,
            timestamp_ns: 0,
        }
    }
}

impl MovingObject {
    pub fn position(&self) -> Vector2D {
        self.position
    }

    pub fn set_position(&mut self, position: Vector2D) {
        self.position = position;
    }

    pub fn velocity(&self) -> Vector2D {
        self.velocity
    }

    /// Set the velocity, clamping its magnitude to `MAX_VELOCITY_VALUE`
    ///
    /// Returns true if the clamp fired.
    pub fn set_velocity(&mut self, velocity: Vector2D) -> bool {
        self.velocity = velocity;
        if velocity.value() > MAX_VELOCITY_VALUE {
            self.velocity = velocity.normalized() * MAX_VELOCITY_VALUE;
            return true;
        }
        false
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn set_acceleration(&mut self, acceleration: f64) {
        self.acceleration = acceleration;
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    pub fn set_timestamp_ns(&mut self, time: i64) {
        self.timestamp_ns = time;
    }

    /// Position at `time` assuming constant velocity. Pure.
    #[inline]
    pub fn position_at(&self, time: i64) -> Vector2D {
        let delta_t = (time - self.timestamp_ns) as f64;
        self.position.add_multiple(self.velocity, delta_t)
    }

    /// Commit the extrapolated position and timestamp without friction
    pub fn advance_to(&mut self, time: i64) {
        self.position = self.position_at(time);
        self.timestamp_ns = time;
    }

    /// Commit position and timestamp, then apply friction
    pub fn update(&mut self, time: i64) {
        self.advance_to(time);
        if self.acceleration != 1.0 {
            // fast objects get extra drag
            let acc = self.acceleration
                - HIGH_VELOCITY_FRICTION * (self.velocity.value() / MAX_VELOCITY_VALUE);
            self.velocity *= acc;
        }
    }

    /// Scale the velocity in place (collision damping, never increases speed)
    pub(crate) fn damp_velocity(&mut self, factor: f64) {
        self.velocity *= factor;
    }
}

/// Inertia of a disk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Mass {
    /// Infinite mass: never gains velocity from impacts
    Fixed,
    Mobile(f64),
}

impl Mass {
    /// Numeric mass, infinite for fixed disks
    pub fn value(self) -> f64 {
        match self {
            Mass::Fixed => f64::INFINITY,
            Mass::Mobile(m) => m,
        }
    }

    /// Wire representation (f64::MAX marks a fixed disk)
    pub fn to_wire(self) -> f64 {
        match self {
            Mass::Fixed => f64::MAX,
            Mass::Mobile(m) => m,
        }
    }

    pub fn from_wire(value: f64) -> Self {
        if value == f64::MAX || value.is_infinite() {
            Mass::Fixed
        } else {
            Mass::Mobile(value)
        }
    }
}

impl Default for Mass {
    fn default() -> Self {
        Mass::Mobile(DEFAULT_DISK_MASS)
    }
}

/// Visual attributes carried for the renderer and the wire format
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub material_id: i32,
    pub alpha: f32,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            material_id: 0,
            alpha: 1.0,
        }
    }
}

/// A disk-shaped moving object (puck, player paddle, corner post)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub(crate) id: DiskId,
    motion: MovingObject,
    radius: f64,
    /// Visual only
    height: f64,
    mass: Mass,
    /// Player credited with the last hit (-1 = none)
    last_hit_player: i16,
    pub appearance: Appearance,
}

impl Disk {
    pub fn new(radius: f64, height: f64) -> Self {
        Self {
            id: DiskId::default(),
            motion: MovingObject::default(),
            radius,
            height,
            mass: Mass::default(),
            last_hit_player: -1,
            appearance: Appearance::default(),
        }
    }

    /// Builder-style position
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.motion.set_position(Vector2D::new(x, y));
        self
    }

    /// Builder-style velocity (units/ns, clamped)
    pub fn moving(mut self, vx: f64, vy: f64) -> Self {
        self.set_velocity(Vector2D::new(vx, vy));
        self
    }

    /// Builder-style mass
    pub fn with_mass(mut self, mass: Mass) -> Self {
        self.mass = mass;
        self
    }

    pub fn id(&self) -> DiskId {
        self.id
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn mass(&self) -> Mass {
        self.mass
    }

    pub fn set_mass(&mut self, mass: Mass) {
        self.mass = mass;
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.mass, Mass::Fixed)
    }

    pub fn set_fixed(&mut self) {
        self.mass = Mass::Fixed;
    }

    pub fn last_hit_player(&self) -> i16 {
        self.last_hit_player
    }

    pub fn set_last_hit_player(&mut self, index: i16) {
        self.last_hit_player = index;
    }

    pub fn motion(&self) -> &MovingObject {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MovingObject {
        &mut self.motion
    }

    pub fn position(&self) -> Vector2D {
        self.motion.position()
    }

    pub fn set_position(&mut self, position: Vector2D) {
        self.motion.set_position(position);
    }

    pub fn velocity(&self) -> Vector2D {
        self.motion.velocity()
    }

    /// Set the velocity, clamped to `MAX_VELOCITY_VALUE`; logs when the clamp fires
    pub fn set_velocity(&mut self, velocity: Vector2D) {
        if self.motion.set_velocity(velocity) {
            log::warn!(
                "Very high velocity {} set for {}",
                velocity.per_second(),
                self
            );
        }
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.motion.timestamp_ns()
    }

    pub fn set_timestamp_ns(&mut self, time: i64) {
        self.motion.set_timestamp_ns(time);
    }

    #[inline]
    pub fn position_at(&self, time: i64) -> Vector2D {
        self.motion.position_at(time)
    }

    pub fn update(&mut self, time: i64) {
        self.motion.update(time);
    }
}

impl std::fmt::Display for Disk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "disk {} at {}, velocity {}, mass = ",
            self.id.0,
            self.position(),
            self.velocity().per_second()
        )?;
        match self.mass {
            Mass::Fixed => write!(f, "infinite"),
            Mass::Mobile(m) => write!(f, "{}", m),
        }
    }
}
