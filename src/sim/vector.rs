//! 2D vector helpers on top of `glam::DVec2`
//!
//! Positions are world units, velocities are units per nanosecond.

use glam::DVec2;

use crate::consts::{EPSILON, NANOS_PER_SECOND};

/// The vector type used throughout the simulation
pub type Vector2D = DVec2;

/// Operations the collision code needs beyond what glam provides
pub trait VectorExt {
    /// Euclidean length
    fn value(self) -> f64;
    fn scalar_product(self, other: Self) -> f64;
    /// `self + other * factor`, the dominant operation in the collision search
    fn add_multiple(self, other: Self, factor: f64) -> Self;
    /// Unit vector in the same direction. Warns for very short vectors and
    /// returns zero for the zero vector.
    fn normalized(self) -> Self;
    fn inverse(self) -> Self;
    /// Angle in radians (0..π). NaN when rounding pushes the cosine past ±1
    /// or either vector is zero.
    fn enclosed_angle(self, other: Self) -> f64;
    fn is_orthogonal(self, other: Self) -> bool;
    /// Velocity that moves from `self` to `destination` in `delta_ns`
    fn velocity_towards(self, destination: Self, delta_ns: i64) -> Self;
    /// Human readable velocity in units per second
    fn per_second(self) -> String;
}

impl VectorExt for DVec2 {
    #[inline]
    fn value(self) -> f64 {
        self.length()
    }

    #[inline]
    fn scalar_product(self, other: Self) -> f64 {
        self.dot(other)
    }

    #[inline]
    fn add_multiple(self, other: Self, factor: f64) -> Self {
        DVec2::new(self.x + other.x * factor, self.y + other.y * factor)
    }

    fn normalized(self) -> Self {
        let value = self.length();
        if value == 0.0 {
            log::warn!("normalizing the zero vector");
            return DVec2::ZERO;
        }
        if value < EPSILON {
            log::warn!("normalizing a very short vector {}", self);
        }
        self / value
    }

    #[inline]
    fn inverse(self) -> Self {
        -self
    }

    fn enclosed_angle(self, other: Self) -> f64 {
        (self.dot(other) / (self.length() * other.length())).acos()
    }

    fn is_orthogonal(self, other: Self) -> bool {
        self.dot(other).abs() < EPSILON
    }

    fn velocity_towards(self, destination: Self, delta_ns: i64) -> Self {
        (destination - self) / delta_ns as f64
    }

    fn per_second(self) -> String {
        format!(
            "[{}/s, {}/s]",
            self.x * NANOS_PER_SECOND,
            self.y * NANOS_PER_SECOND
        )
    }
}
