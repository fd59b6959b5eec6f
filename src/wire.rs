//! Big-endian binary records for disks, snapshots and collision events
//!
//! Records are length-implicit: readers must know what comes next. The
//! layouts are a compatibility contract with the network layer.
//!
//! ```text
//! disk:      radius f64 | height f64 | mass f64 | pos x,y f64 | vel x,y f64
//!            | acceleration f64 | last hit i16 | material i32 | alpha f32
//! update:    pos x,y f64 | vel x,y f64 | acceleration f64 | last hit i16
//! snapshot:  count i32 | update * count
//! collision: kind i32 | time i64 | point x,y f64 | velocity x,y f64
//!            | disk i32 | wall i32        (kind 2)
//!            | disk1 i32 | disk2 i32      (kind 3)
//! ```

use std::io::{Read, Write};

use crate::sim::disk::{Appearance, Disk, DiskId, Mass};
use crate::sim::event::CollisionEvent;
use crate::sim::simulation::Simulation;
use crate::sim::vector::Vector2D;
use crate::sim::wall::WallId;

/// Message kind of a disk-wall collision record
pub const DISK_WALL_COLLISION: i32 = 2;
/// Message kind of a disk-disk collision record
pub const DISK_DISK_COLLISION: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown material id {0}")]
    UnknownMaterial(i32),

    #[error("unknown collision message kind {0}")]
    UnknownCollisionKind(i32),

    #[error("invalid object index {0}")]
    InvalidIndex(i32),
}

macro_rules! be_primitives {
    ($($write:ident / $read:ident: $t:ty,)*) => {$(
        fn $write(writer: &mut impl Write, value: $t) -> Result<(), WireError> {
            writer.write_all(&value.to_be_bytes())?;
            Ok(())
        }

        fn $read(reader: &mut impl Read) -> Result<$t, WireError> {
            let mut buf = [0u8; std::mem::size_of::<$t>()];
            reader.read_exact(&mut buf)?;
            Ok(<$t>::from_be_bytes(buf))
        }
    )*};
}

be_primitives! {
    write_i16 / read_i16: i16,
    write_i32 / read_i32: i32,
    write_i64 / read_i64: i64,
    write_f32 / read_f32: f32,
    write_f64 / read_f64: f64,
}

fn write_vector(writer: &mut impl Write, v: Vector2D) -> Result<(), WireError> {
    write_f64(writer, v.x)?;
    write_f64(writer, v.y)
}

fn read_vector(reader: &mut impl Read) -> Result<Vector2D, WireError> {
    let x = read_f64(reader)?;
    let y = read_f64(reader)?;
    Ok(Vector2D::new(x, y))
}

fn write_index(writer: &mut impl Write, index: u32) -> Result<(), WireError> {
    write_i32(writer, index as i32)
}

fn read_index(reader: &mut impl Read) -> Result<u32, WireError> {
    let index = read_i32(reader)?;
    u32::try_from(index).map_err(|_| WireError::InvalidIndex(index))
}

/// Write the full disk record
pub fn write_disk(writer: &mut impl Write, disk: &Disk) -> Result<(), WireError> {
    write_f64(writer, disk.radius())?;
    write_f64(writer, disk.height())?;
    write_f64(writer, disk.mass().to_wire())?;
    write_vector(writer, disk.position())?;
    write_vector(writer, disk.velocity())?;
    write_f64(writer, disk.motion().acceleration())?;
    write_i16(writer, disk.last_hit_player())?;
    write_i32(writer, disk.appearance.material_id)?;
    write_f32(writer, disk.appearance.alpha)
}

/// Read a full disk record into a new, unregistered disk
pub fn read_disk(reader: &mut impl Read) -> Result<Disk, WireError> {
    let radius = read_f64(reader)?;
    let height = read_f64(reader)?;
    let mut disk = Disk::new(radius, height).with_mass(Mass::from_wire(read_f64(reader)?));
    disk.set_position(read_vector(reader)?);
    disk.set_velocity(read_vector(reader)?);
    disk.motion_mut().set_acceleration(read_f64(reader)?);
    disk.set_last_hit_player(read_i16(reader)?);

    let material_id = read_i32(reader)?;
    if material_id < 0 {
        return Err(WireError::UnknownMaterial(material_id));
    }
    disk.appearance = Appearance {
        material_id,
        alpha: read_f32(reader)?,
    };
    Ok(disk)
}

/// Write the per-tick state of a disk
pub fn write_disk_update(writer: &mut impl Write, disk: &Disk) -> Result<(), WireError> {
    write_vector(writer, disk.position())?;
    write_vector(writer, disk.velocity())?;
    write_f64(writer, disk.motion().acceleration())?;
    write_i16(writer, disk.last_hit_player())
}

pub fn read_disk_update(reader: &mut impl Read, disk: &mut Disk) -> Result<(), WireError> {
    disk.set_position(read_vector(reader)?);
    disk.set_velocity(read_vector(reader)?);
    disk.motion_mut().set_acceleration(read_f64(reader)?);
    disk.set_last_hit_player(read_i16(reader)?);
    Ok(())
}

/// Consume one update record without applying it
pub fn skip_disk_update(reader: &mut impl Read) -> Result<(), WireError> {
    let mut buf = [0u8; 5 * 8 + 2];
    reader.read_exact(&mut buf)?;
    Ok(())
}

/// Write the state of every moving disk, in registration order
pub fn write_simulation_update(sim: &Simulation, writer: &mut impl Write) -> Result<(), WireError> {
    write_i32(writer, sim.moving_disk_ids().len() as i32)?;
    for disk in sim.moving_disks() {
        write_disk_update(writer, disk)?;
    }
    Ok(())
}

/// Apply a snapshot to the moving disks, in registration order
///
/// Surplus records are skipped. Returns the number of disks updated.
pub fn read_simulation_update(sim: &mut Simulation, reader: &mut impl Read) -> Result<usize, WireError> {
    let count = read_i32(reader)?.max(0) as usize;
    let ids = sim.moving_disk_ids().to_vec();
    let to_update = count.min(ids.len());

    if to_update < ids.len() {
        log::info!("No simulation data for {} disks", ids.len() - to_update);
    }
    for id in &ids[..to_update] {
        match sim.disk_mut(*id) {
            Some(disk) => read_disk_update(reader, disk)?,
            None => skip_disk_update(reader)?,
        }
    }

    let to_skip = count - to_update;
    if to_skip > 0 {
        log::info!("Skipping simulation update for {} disks", to_skip);
        for _ in 0..to_skip {
            skip_disk_update(reader)?;
        }
    }
    Ok(to_update)
}

/// Time, point and velocity shared by all collision records
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventBase {
    pub time: i64,
    pub point: Vector2D,
    pub velocity: Vector2D,
}

/// A decoded collision record; objects are referenced by index only
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireCollision {
    DiskWall {
        base: EventBase,
        disk: DiskId,
        wall: WallId,
    },
    DiskDisk {
        base: EventBase,
        disk1: DiskId,
        disk2: DiskId,
    },
}

impl WireCollision {
    pub fn base(&self) -> &EventBase {
        match self {
            WireCollision::DiskWall { base, .. } | WireCollision::DiskDisk { base, .. } => base,
        }
    }
}

pub fn write_collision(writer: &mut impl Write, event: &CollisionEvent) -> Result<(), WireError> {
    let kind = match event {
        CollisionEvent::DiskWall(_) => DISK_WALL_COLLISION,
        CollisionEvent::DiskDisk(_) => DISK_DISK_COLLISION,
    };
    write_i32(writer, kind)?;
    write_i64(writer, event.time())?;
    write_vector(writer, event.point())?;
    write_vector(writer, event.velocity())?;

    match event {
        CollisionEvent::DiskWall(e) => {
            write_index(writer, e.disk.0)?;
            write_index(writer, e.wall.0)
        }
        CollisionEvent::DiskDisk(e) => {
            write_index(writer, e.disk1.0)?;
            write_index(writer, e.disk2.0)
        }
    }
}

pub fn read_collision(reader: &mut impl Read) -> Result<WireCollision, WireError> {
    let kind = read_i32(reader)?;
    if kind != DISK_WALL_COLLISION && kind != DISK_DISK_COLLISION {
        return Err(WireError::UnknownCollisionKind(kind));
    }

    let base = EventBase {
        time: read_i64(reader)?,
        point: read_vector(reader)?,
        velocity: read_vector(reader)?,
    };
    let first = read_index(reader)?;
    let second = read_index(reader)?;

    Ok(if kind == DISK_WALL_COLLISION {
        WireCollision::DiskWall {
            base,
            disk: DiskId(first),
            wall: WallId(second),
        }
    } else {
        WireCollision::DiskDisk {
            base,
            disk1: DiskId(first),
            disk2: DiskId(second),
        }
    })
}
