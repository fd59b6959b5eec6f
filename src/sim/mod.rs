//! Continuous-time physics for disks and walls
//!
//! - Time is integer nanoseconds, velocities are units per nanosecond
//! - Motion is linear between ticks; collisions are found on the trajectories
//! - Stable iteration order (registration order) so ticks are reproducible

pub mod clock;
pub mod collision;
pub mod disk;
pub mod driver;
pub mod event;
pub mod simulation;
pub mod vector;
pub mod wall;

pub use clock::{ManualClock, MonotonicClock, SimClock};
pub use collision::{CollisionEngine, CollisionReport, plane_ray_intersection, reflect_velocity, sanity_check};
pub use disk::{Appearance, Disk, DiskId, Mass, MovingObject};
pub use driver::{Driver, SharedSimulation, UpdateBlock};
pub use event::{CollisionEvent, DiskDiskCollision, DiskWallCollision, WallEdge};
pub use simulation::{
    CollisionListener, ListenerContext, ListenerId, Simulation, SimulationListener, TickReport,
    TickStatus,
};
pub use vector::{Vector2D, VectorExt};
pub use wall::{Durability, Face, FaceEnd, Wall, WallId, WallKind};
