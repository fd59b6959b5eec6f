//! Collision events produced by the engine
//!
//! Equality identifies the contact (which objects, which face or corner),
//! never when or where it happened. The engine relies on this to avoid
//! re-triggering the same contact from floating point residue.

use serde::{Deserialize, Serialize};

use super::disk::DiskId;
use super::vector::Vector2D;
use super::wall::{FaceEnd, WallId};

/// A wall corner that was hit instead of a face
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WallEdge {
    pub end: FaceEnd,
    pub point: Vector2D,
}

impl PartialEq for WallEdge {
    fn eq(&self, other: &Self) -> bool {
        self.end == other.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskWallCollision {
    /// Absolute simulation time (ns)
    pub time: i64,
    pub point: Vector2D,
    /// Disk velocity just before the response
    pub velocity: Vector2D,
    pub disk: DiskId,
    pub wall: WallId,
    /// Index of the face that was tested (0 = front)
    pub face: usize,
    /// Set when the corner at one end of `face` was hit
    pub edge: Option<WallEdge>,
}

impl PartialEq for DiskWallCollision {
    fn eq(&self, other: &Self) -> bool {
        self.disk == other.disk
            && self.wall == other.wall
            && self.face == other.face
            && self.edge == other.edge
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskDiskCollision {
    pub time: i64,
    pub point: Vector2D,
    /// Relative velocity along the contact normal (or relative to the fixed disk)
    pub velocity: Vector2D,
    pub disk1: DiskId,
    pub disk2: DiskId,
}

impl PartialEq for DiskDiskCollision {
    fn eq(&self, other: &Self) -> bool {
        self.disk1 == other.disk1 && self.disk2 == other.disk2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollisionEvent {
    DiskWall(DiskWallCollision),
    DiskDisk(DiskDiskCollision),
}

impl CollisionEvent {
    pub fn time(&self) -> i64 {
        match self {
            CollisionEvent::DiskWall(e) => e.time,
            CollisionEvent::DiskDisk(e) => e.time,
        }
    }

    pub fn point(&self) -> Vector2D {
        match self {
            CollisionEvent::DiskWall(e) => e.point,
            CollisionEvent::DiskDisk(e) => e.point,
        }
    }

    pub fn velocity(&self) -> Vector2D {
        match self {
            CollisionEvent::DiskWall(e) => e.velocity,
            CollisionEvent::DiskDisk(e) => e.velocity,
        }
    }

    /// True if `disk` takes part in this collision
    pub fn involves(&self, disk: DiskId) -> bool {
        match self {
            CollisionEvent::DiskWall(e) => e.disk == disk,
            CollisionEvent::DiskDisk(e) => e.disk1 == disk || e.disk2 == disk,
        }
    }
}

impl std::fmt::Display for CollisionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionEvent::DiskWall(e) if e.edge.is_some() => write!(
                f,
                "[Disk {} - Wall {} edge] collision at {}ns",
                e.disk.0, e.wall.0, e.time
            ),
            CollisionEvent::DiskWall(e) => write!(
                f,
                "[Disk {} - Wall {} face {}] collision at {}ns",
                e.disk.0, e.wall.0, e.face, e.time
            ),
            CollisionEvent::DiskDisk(e) => write!(
                f,
                "[Disk {} - Disk {}] collision at {}ns",
                e.disk1.0, e.disk2.0, e.time
            ),
        }
    }
}
