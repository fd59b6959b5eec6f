//! Collision detection and response for disks and walls
//!
//! The tricky part of the simulation: every tick, find the earliest contact
//! between any disk and any wall face, wall corner or other disk inside the
//! tick window, resolve it at that instant, and keep going until the window
//! is clear. Contact times are searched on the continuous trajectories, so
//! fast disks cannot tunnel through thin walls or each other.

use super::disk::Disk;
use super::event::{CollisionEvent, DiskDiskCollision, DiskWallCollision, WallEdge};
use super::vector::{Vector2D, VectorExt};
use super::wall::{Face, FaceEnd, Wall};
use crate::consts::*;
use crate::settings::PhysicsConfig;

/// Result of one collision pass over a tick window
#[derive(Debug, Clone, Default)]
pub struct CollisionReport {
    /// Resolved collisions in the order they were handled
    pub events: Vec<CollisionEvent>,
    /// The per-tick collision cap stopped the pass early
    pub circuit_broken: bool,
}

/// A candidate contact, tied to slots in the disk and wall slices being checked
#[derive(Debug, Clone)]
struct Contact {
    disk: usize,
    /// Wall slot for disk-wall contacts, second disk slot for disk-disk
    other: usize,
    event: CollisionEvent,
}

impl Contact {
    /// Same objects, same face or corner
    fn is_same(&self, other: &Contact) -> bool {
        self.disk == other.disk
            && self.other == other.other
            && match (&self.event, &other.event) {
                (CollisionEvent::DiskWall(a), CollisionEvent::DiskWall(b)) => {
                    a.face == b.face && a.edge == b.edge
                }
                (CollisionEvent::DiskDisk(_), CollisionEvent::DiskDisk(_)) => true,
                _ => false,
            }
    }
}

/// Where and when a disk meets a wall face or one of its corners
#[derive(Debug, Clone, Copy)]
struct FaceHit {
    time: i64,
    point: Vector2D,
    edge: Option<WallEdge>,
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vector2D, normal: Vector2D) -> Vector2D {
    velocity.add_multiple(normal, -2.0 * normal.dot(velocity))
}

/// Intersect a ray with a plane (line in 2D)
///
/// Returns lambda with `hit = ray_pos + lambda * ray_dir`, or None if the ray
/// is parallel to the plane or the plane lies behind the ray start.
pub fn plane_ray_intersection(
    plane_pos: Vector2D,
    plane_normal: Vector2D,
    ray_pos: Vector2D,
    ray_dir: Vector2D,
) -> Option<f64> {
    let scalar = ray_dir.dot(plane_normal);
    // Exact zero only: directions are velocities in units/ns, so genuine
    // grazing rays have products far below EPSILON.
    if scalar == 0.0 {
        log::warn!("ray {} parallel to plane with normal {}", ray_dir, plane_normal);
        return None;
    }

    let lambda = plane_normal.dot(plane_pos - ray_pos) / scalar;
    if !(lambda > 0.0) {
        return None;
    }
    Some(lambda)
}

/// Number of trajectory samples: at least 3, more for fast or small objects
fn sample_count(max_travel: f64, min_radius: f64) -> i64 {
    let samples = (5.0 * max_travel / min_radius).round();
    if samples.is_nan() {
        return 3;
    }
    (samples as i64).max(3)
}

fn pair_mut(disks: &mut [Disk], first: usize, second: usize) -> (&mut Disk, &mut Disk) {
    debug_assert!(first < second);
    let (head, tail) = disks.split_at_mut(second);
    (&mut head[first], &mut tail[0])
}

/// Check that no disks overlap each other and no disk sits on a wall corner
///
/// Diagnostic only: violations are logged and reported, never corrected.
pub fn sanity_check(disks: &[Disk], walls: &[Wall], tolerance: f64) -> bool {
    let mut sane = true;
    for (i, disk1) in disks.iter().enumerate() {
        for disk2 in &disks[i + 1..] {
            let distance = disk1.position().distance(disk2.position());
            if distance < disk1.radius() + disk2.radius() - tolerance {
                log::warn!(
                    "Disks overlapping:\n  {} (time {})\n  {} (time {})",
                    disk1,
                    disk1.timestamp_ns(),
                    disk2,
                    disk2.timestamp_ns()
                );
                sane = false;
            }
        }
    }

    for disk in disks {
        for wall in walls {
            if disk.is_fixed() && wall.is_destroyable() {
                continue;
            }
            for (i, corner) in wall.coords().iter().enumerate() {
                if disk.position().distance(*corner) < 0.95 * disk.radius() {
                    log::warn!("{} is inside vertex {} of {}", disk, i, wall);
                    sane = false;
                }
            }
        }
    }
    sane
}

/// Time-of-impact search and collision response
#[derive(Debug, Clone, Default)]
pub struct CollisionEngine {
    config: PhysicsConfig,
}

impl CollisionEngine {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Find and resolve all collisions in `[after_time, time_limit]`
    ///
    /// Disks involved in a collision are moved to the collision instant and
    /// get their new velocity; the caller commits the remaining motion to
    /// `time_limit` afterwards.
    pub fn check_collisions(
        &self,
        walls: &[Wall],
        disks: &mut [Disk],
        after_time: i64,
        time_limit: i64,
    ) -> CollisionReport {
        // Everything handled this tick, to damp disks trapped between obstacles
        let mut handled: Vec<Contact> = Vec::new();
        let mut after_time = after_time;
        let mut circuit_broken = false;

        while let Some(mut contact) =
            self.find_earliest(walls, disks, after_time, time_limit, handled.last())
        {
            log::debug!(
                "Found {} in time [{} .. {}]",
                contact.event,
                after_time,
                time_limit
            );

            self.handle(&mut contact, &handled, walls, disks);

            if self.config.sanity_checks && !sanity_check(disks, walls, SANITY_TOLERANCE) {
                log::warn!("Insane after handling {}", contact.event);
            }

            after_time = contact.event.time();
            handled.push(contact);

            if handled.len() >= self.config.max_collisions_per_tick {
                log::warn!(
                    "Collision cap of {} reached at {}ns, skipping the rest of this tick",
                    self.config.max_collisions_per_tick,
                    after_time
                );
                circuit_broken = true;
                break;
            }
            if after_time >= time_limit {
                break;
            }
        }

        CollisionReport {
            events: handled.into_iter().map(|c| c.event).collect(),
            circuit_broken,
        }
    }

    /// Globally earliest contact, skipping a repeat of the last handled one
    fn find_earliest(
        &self,
        walls: &[Wall],
        disks: &[Disk],
        after_time: i64,
        time_limit: i64,
        last_handled: Option<&Contact>,
    ) -> Option<Contact> {
        let mut closest: Option<Contact> = None;
        let mut consider = |candidate: Contact| {
            let earlier = match &closest {
                Some(best) => candidate.event.time() < best.event.time(),
                None => true,
            };
            // floating point residue can re-detect the contact just handled
            if earlier && !last_handled.is_some_and(|last| last.is_same(&candidate)) {
                closest = Some(candidate);
            }
        };

        for (i, disk) in disks.iter().enumerate() {
            for (w, wall) in walls.iter().enumerate() {
                if let Some(contact) = self.disk_wall_contact(i, disk, w, wall, after_time, time_limit) {
                    debug_assert!(after_time <= contact.event.time());
                    debug_assert!(contact.event.time() <= time_limit);
                    consider(contact);
                }
            }
            for (j, other) in disks.iter().enumerate().skip(i + 1) {
                if let Some(contact) = self.disk_disk_contact(i, disk, j, other, after_time, time_limit) {
                    consider(contact);
                }
            }
        }
        closest
    }

    fn disk_wall_contact(
        &self,
        disk_slot: usize,
        disk: &Disk,
        wall_slot: usize,
        wall: &Wall,
        after_time: i64,
        time_limit: i64,
    ) -> Option<Contact> {
        // player disks pass through breakable walls
        if disk.is_fixed() && wall.is_destroyable() {
            return None;
        }

        let (face, hit) = if wall.is_infinite() {
            (0, self.infinite_face_hit(disk, wall.front_face(), after_time, time_limit)?)
        } else {
            let mut best: Option<(usize, FaceHit)> = None;
            for (f, face) in wall.faces().iter().enumerate() {
                if let Some(hit) = self.face_hit(disk, face, after_time, time_limit) {
                    if best.is_none_or(|(_, b)| hit.time < b.time) {
                        best = Some((f, hit));
                    }
                }
            }
            best?
        };

        Some(Contact {
            disk: disk_slot,
            other: wall_slot,
            event: CollisionEvent::DiskWall(DiskWallCollision {
                time: hit.time,
                point: hit.point,
                velocity: disk.velocity(),
                disk: disk.id(),
                wall: wall.id(),
                face,
                edge: hit.edge,
            }),
        })
    }

    /// Closed-form contact with the front face of a wall whose ends are unreachable
    fn infinite_face_hit(
        &self,
        disk: &Disk,
        face: &Face,
        after_time: i64,
        time_limit: i64,
    ) -> Option<FaceHit> {
        let velocity = disk.velocity();
        let normal = face.normal_vector();
        if velocity.dot(normal) >= 0.0 {
            // moving away from the wall
            return None;
        }

        // the point on the disk surface nearest to the wall
        let point = disk.position().add_multiple(normal, -disk.radius());
        let lambda = plane_ray_intersection(face.position_vector(), normal, point, velocity)?;

        let time = disk.timestamp_ns().saturating_add(lambda.round() as i64);
        // another disk may have hit a wall at this very instant
        if !(after_time <= time && time <= time_limit) {
            return None;
        }
        Some(FaceHit {
            time,
            point: point.add_multiple(velocity, lambda),
            edge: None,
        })
    }

    /// Contact with a bounded face, falling back to its two corners
    fn face_hit(&self, disk: &Disk, face: &Face, after_time: i64, time_limit: i64) -> Option<FaceHit> {
        let velocity = disk.velocity();
        let normal = face.normal_vector();
        if velocity.dot(normal) >= 0.0 {
            return None;
        }

        let center = disk.position();
        let wall_start = face.position_vector();
        let wall_end = face.face_end_vector();

        // disk center already behind the face plane
        plane_ray_intersection(wall_start, normal, center, velocity)?;

        // shoot a ray from the nearest surface point along the velocity
        let nearest = center.add_multiple(normal, -disk.radius());
        let (point, lambda) = match plane_ray_intersection(wall_start, normal, nearest, velocity) {
            Some(lambda) => (nearest.add_multiple(velocity, lambda), lambda),
            // surface crossed the plane but the center did not: only a corner can still be hit
            None => (nearest, 0.0),
        };

        let on_wall = (wall_start - point).dot(wall_end - point) < 0.0;
        if on_wall {
            if lambda == 0.0 {
                log::debug!("Disk-face contact at start time for {}", disk);
            }
            let time = disk.timestamp_ns().saturating_add(lambda.round() as i64);
            if !(after_time <= time && time <= time_limit) {
                return None;
            }
            return Some(FaceHit {
                time,
                point,
                edge: None,
            });
        }

        let start_time = self.edge_contact_time(disk, wall_start, after_time, time_limit);
        let end_time = self.edge_contact_time(disk, wall_end, after_time, time_limit);
        let (end, time) = match (start_time, end_time) {
            (Some(s), Some(e)) if s < e => (FaceEnd::Start, s),
            (Some(s), None) => (FaceEnd::Start, s),
            (_, Some(e)) => (FaceEnd::End, e),
            (None, None) => return None,
        };

        Some(FaceHit {
            time,
            point: disk.position_at(time),
            edge: Some(WallEdge {
                end,
                point: face.endpoint(end),
            }),
        })
    }

    /// Sampled search for the disk touching a corner point
    fn edge_contact_time(&self, disk: &Disk, edge: Vector2D, after_time: i64, time_limit: i64) -> Option<i64> {
        let start_time = disk.timestamp_ns();
        let max_distance = disk.radius() + EPSILON;
        let travel = disk.position_at(time_limit).distance(disk.position());
        let samples = sample_count(travel, disk.radius());

        let time = self.search_contact(start_time, time_limit, samples, |t| {
            disk.position_at(t).distance(edge) < max_distance
        })?;
        (time > after_time).then_some(time)
    }

    fn disk_disk_contact(
        &self,
        slot1: usize,
        disk1: &Disk,
        slot2: usize,
        disk2: &Disk,
        after_time: i64,
        time_limit: i64,
    ) -> Option<Contact> {
        let start_time = after_time
            .max(disk1.timestamp_ns())
            .max(disk2.timestamp_ns());
        if start_time > time_limit {
            return None;
        }

        let (r1, r2) = (disk1.radius(), disk2.radius());
        let max_distance = r1 + r2 + EPSILON;
        let travel1 = disk1.position_at(time_limit).distance(disk1.position_at(start_time));
        let travel2 = disk2.position_at(time_limit).distance(disk2.position_at(start_time));
        let samples = sample_count(travel1.max(travel2), r1.min(r2));

        let time = self.search_contact(start_time, time_limit, samples, |t| {
            disk1.position_at(t).distance(disk2.position_at(t)) < max_distance
        })?;

        // contact point lies on the center line, split by the radii
        let p1 = disk1.position_at(time);
        let p2 = disk2.position_at(time);
        let point = p1.add_multiple(p2 - p1, r1 / (r1 + r2));

        Some(Contact {
            disk: slot1,
            other: slot2,
            event: CollisionEvent::DiskDisk(DiskDiskCollision {
                time,
                point,
                velocity: disk1.velocity() - disk2.velocity(),
                disk1: disk1.id(),
                disk2: disk2.id(),
            }),
        })
    }

    /// Step through `[start, limit]` until `touching` holds, then bisect the
    /// bracket down to the configured precision
    ///
    /// Returns the last instant known to be contact-free (or `start` when
    /// already touching there).
    fn search_contact(
        &self,
        start: i64,
        limit: i64,
        samples: i64,
        touching: impl Fn(i64) -> bool,
    ) -> Option<i64> {
        if limit < start {
            return None;
        }
        if touching(start) {
            log::debug!("Contact at start of search window {}ns", start);
            return Some(start);
        }

        let span = limit - start;
        if span == 0 {
            return None;
        }
        let step = span / samples.clamp(1, span);

        let mut previous = start;
        loop {
            let t = previous.saturating_add(step).min(limit);
            if touching(t) {
                let (mut t1, mut t2) = (previous, t);
                while t2 - t1 > self.config.max_collision_time_error_ns {
                    let mid = t1 + (t2 - t1) / 2;
                    if touching(mid) {
                        t2 = mid;
                    } else {
                        t1 = mid;
                    }
                }
                return Some(t1);
            }
            if t >= limit {
                return None;
            }
            previous = t;
        }
    }

    fn handle(&self, contact: &mut Contact, handled: &[Contact], walls: &[Wall], disks: &mut [Disk]) {
        let repeats = handled.iter().filter(|c| c.is_same(&*contact)).count();
        let (slot, other) = (contact.disk, contact.other);

        match &mut contact.event {
            CollisionEvent::DiskWall(event) => {
                let disk = &mut disks[slot];
                if repeats > 0 {
                    // rapid re-contact with the same wall drains energy
                    disk.motion_mut()
                        .damp_velocity(self.config.impulse_loss.powi(repeats as i32));
                }
                let face = walls[other].face(event.face);
                match event.edge {
                    None => self.resolve_wall_face(event, disk, face),
                    Some(edge) => self.resolve_wall_edge(event, disk, edge.point),
                }
            }
            CollisionEvent::DiskDisk(event) => {
                let (disk1, disk2) = pair_mut(disks, slot, other);
                if repeats > 0 {
                    // let a trapping player disk bounce off
                    let trap = if disk1.is_fixed() {
                        Some(&mut *disk1)
                    } else if disk2.is_fixed() {
                        Some(&mut *disk2)
                    } else {
                        None
                    };
                    if let Some(fixed) = trap {
                        fixed.motion_mut().advance_to(event.time);
                        fixed.set_velocity(fixed.velocity() * -FIXED_DISK_TRAP_REBOUND);
                    }
                }
                if disk1.is_fixed() {
                    self.resolve_fixed_disk(event, disk1, disk2);
                } else if disk2.is_fixed() {
                    self.resolve_fixed_disk(event, disk2, disk1);
                } else {
                    self.resolve_disks(event, disk1, disk2);
                }
            }
        }
    }

    /// Elastic collision of two mobile disks
    fn resolve_disks(&self, event: &mut DiskDiskCollision, disk1: &mut Disk, disk2: &mut Disk) {
        disk1.motion_mut().advance_to(event.time);
        disk2.motion_mut().advance_to(event.time);

        let v1 = disk1.velocity();
        let v2 = disk2.velocity();

        let central = (event.point - disk1.position()).normalized();
        let tangential = central.perp();

        // tangential components pass through, central components are exchanged
        let v1_tang = tangential * tangential.dot(v1);
        let v2_tang = tangential * tangential.dot(v2);
        let v1_cent = central * central.dot(v1);
        let v2_cent = central * central.dot(v2);

        event.velocity = v1_cent - v2_cent;

        let m1 = disk1.mass().value();
        let m2 = disk2.mass().value();
        let (new_v1, new_v2) = if m1 == m2 {
            (v1_tang + v2_cent, v2_tang + v1_cent)
        } else {
            (
                v1_tang + (v1_cent * (m1 - m2) + v2_cent * (2.0 * m2)) / (m1 + m2),
                v2_tang + (v2_cent * (m2 - m1) + v1_cent * (2.0 * m1)) / (m1 + m2),
            )
        };

        disk1.set_velocity(new_v1 * self.config.impulse_loss);
        disk2.set_velocity(new_v2 * self.config.impulse_loss);

        // same speed in the same direction would leave the overlap unsolved:
        // push the lighter disk out
        let min_distance = disk1.radius() + disk2.radius();
        let (heavy, light) = if m1 > m2 { (disk1, disk2) } else { (disk2, disk1) };
        let push = light.position() - heavy.position();
        if push.value() <= min_distance {
            let offset = push.normalized() * (min_distance * OVERLAP_PUSH_FACTOR);
            light.set_position(heavy.position() + offset);
            log::debug!("Pushed {} out by {}", light, offset);
        }
    }

    /// A mobile disk bouncing off an immovable one
    fn resolve_fixed_disk(&self, event: &mut DiskDiskCollision, fixed: &mut Disk, light: &mut Disk) {
        fixed.motion_mut().advance_to(event.time);
        light.motion_mut().advance_to(event.time);

        // work in the rest frame of the fixed disk
        let v_fixed = fixed.velocity();
        let v_light = light.velocity() - v_fixed;
        event.velocity = v_light;

        let normal = (event.point - fixed.position()).normalized();

        let min_distance = light.radius() + fixed.radius() + EPSILON;
        let distance = light.position().distance(fixed.position());
        if distance < min_distance {
            light.set_position(light.position().add_multiple(normal, min_distance - distance));
        }

        let reflected = reflect_velocity(v_light, normal);
        light.set_velocity((reflected + v_fixed) * self.config.impulse_loss);
        debug_assert!(light.velocity().value() < MAX_VELOCITY_VALUE * 1.001);

        // credit the hit to whoever controls the fixed disk
        let player = fixed.last_hit_player();
        if player != -1 && !light.is_fixed() {
            light.set_last_hit_player(player);
        }
    }

    fn resolve_wall_face(&self, event: &mut DiskWallCollision, disk: &mut Disk, face: &Face) {
        let normal = face.normal_vector();
        let velocity = disk.velocity();
        event.velocity = velocity;

        disk.motion_mut().advance_to(event.time);

        // disk center sunk into the wall: move it back out along the normal
        let distance =
            plane_ray_intersection(face.position_vector(), normal, disk.position(), -normal)
                .unwrap_or(0.0);
        if distance < disk.radius() {
            disk.set_position(
                disk.position()
                    .add_multiple(normal, disk.radius() - distance + EPSILON),
            );
        }

        disk.set_velocity(reflect_velocity(velocity, normal) * self.config.impulse_loss);
    }

    /// The corner acts as a zero-radius circular obstacle
    fn resolve_wall_edge(&self, event: &mut DiskWallCollision, disk: &mut Disk, edge: Vector2D) {
        disk.motion_mut().advance_to(event.time);

        let velocity = disk.velocity();
        event.velocity = velocity;

        let normal = (disk.position() - edge).normalized();
        disk.set_velocity(reflect_velocity(velocity, normal) * self.config.impulse_loss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::disk::{DiskId, Mass};
    use crate::sim::wall::WallId;
    use proptest::prelude::*;

    const SECOND: i64 = 1_000_000_000;

    fn engine() -> CollisionEngine {
        CollisionEngine::new(PhysicsConfig::default())
    }

    fn numbered(mut disks: Vec<Disk>) -> Vec<Disk> {
        for (i, disk) in disks.iter_mut().enumerate() {
            disk.id = DiskId(i as u32);
        }
        disks
    }

    fn numbered_walls(mut walls: Vec<Wall>) -> Vec<Wall> {
        for (i, wall) in walls.iter_mut().enumerate() {
            wall.id = WallId(i as u32);
        }
        walls
    }

    #[test]
    fn test_reflect_velocity() {
        // Disk moving right, hits vertical wall (normal pointing left)
        let reflected = reflect_velocity(Vector2D::new(100.0, 0.0), Vector2D::new(-1.0, 0.0));
        assert!((reflected.x + 100.0).abs() < 1e-12);
        assert!(reflected.y.abs() < 1e-12);
    }

    #[test]
    fn test_plane_ray_intersection() {
        let n = Vector2D::new(0.0, 1.0);
        let lambda = plane_ray_intersection(Vector2D::ZERO, n, Vector2D::new(0.0, 4.0), Vector2D::new(0.0, -2.0));
        assert_eq!(lambda, Some(2.0));
        // plane behind the ray
        assert!(plane_ray_intersection(Vector2D::ZERO, n, Vector2D::new(0.0, 4.0), Vector2D::new(0.0, 2.0)).is_none());
        // exactly parallel
        assert!(plane_ray_intersection(Vector2D::ZERO, n, Vector2D::new(0.0, 4.0), Vector2D::new(1.0, 0.0)).is_none());
    }

    #[test]
    fn test_grazing_ray_still_intersects() {
        // products below EPSILON are legitimate at units/ns scale
        let lambda = plane_ray_intersection(
            Vector2D::ZERO,
            Vector2D::new(0.0, 1.0),
            Vector2D::new(0.0, 1e-6),
            Vector2D::new(1e-9, -1e-15),
        );
        assert!(lambda.is_some_and(|l| (l - 1e9).abs() < 1.0));
    }

    #[test]
    fn test_equal_mass_head_on_swaps_velocities() {
        let mut disks = numbered(vec![
            Disk::new(1.0, 1.0).with_mass(Mass::Mobile(1.0)).moving(1e-9, 0.0),
            Disk::new(1.0, 1.0).with_mass(Mass::Mobile(1.0)).at(3.0, 0.0),
        ]);

        let report = engine().check_collisions(&[], &mut disks, 0, 2 * SECOND);
        assert!(!report.circuit_broken);
        assert_eq!(report.events.len(), 1);

        let CollisionEvent::DiskDisk(event) = &report.events[0] else {
            panic!("expected a disk-disk collision");
        };
        assert_eq!((event.disk1, event.disk2), (DiskId(0), DiskId(1)));
        assert!((event.time - SECOND).abs() <= MAX_COLLISION_TIME_ERROR);
        assert!((event.point.x - 2.0).abs() < 1e-6);

        assert!(disks[0].velocity().value() < 1e-20);
        assert!((disks[1].velocity().x - 0.9e-9).abs() < 1e-20);
        assert!(disks[1].velocity().y.abs() < 1e-20);
    }

    #[test]
    fn test_heavier_disk_keeps_direction() {
        let mut disks = numbered(vec![
            Disk::new(1.0, 1.0).with_mass(Mass::Mobile(3.0)).moving(1e-9, 0.0),
            Disk::new(1.0, 1.0).with_mass(Mass::Mobile(1.0)).at(3.0, 0.0),
        ]);
        engine().check_collisions(&[], &mut disks, 0, 2 * SECOND);
        // 1D elastic: v1' = (m1-m2)/(m1+m2) u1, v2' = 2 m1/(m1+m2) u1
        assert!((disks[0].velocity().x - 0.9 * 0.5e-9).abs() < 1e-18);
        assert!((disks[1].velocity().x - 0.9 * 1.5e-9).abs() < 1e-18);
    }

    #[test]
    fn test_infinite_wall_reflects_with_impulse_loss() {
        let walls = numbered_walls(vec![Wall::segment(-10.0, 0.0, 10.0, 0.0).infinite()]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(0.0, 5.0).moving(0.0, -1e-9)]);

        let report = engine().check_collisions(&walls, &mut disks, 0, 5 * SECOND);
        assert_eq!(report.events.len(), 1);
        let CollisionEvent::DiskWall(event) = &report.events[0] else {
            panic!("expected a disk-wall collision");
        };
        assert_eq!(event.face, 0);
        assert!(event.edge.is_none());
        assert_eq!(event.time, 4 * SECOND);
        assert!(event.point.y.abs() < 1e-9);
        assert_eq!(event.velocity, Vector2D::new(0.0, -1e-9));

        assert!(disks[0].velocity().x.abs() < 1e-24);
        assert!((disks[0].velocity().y - 0.9e-9).abs() < 1e-20);
    }

    #[test]
    fn test_downward_facing_wall() {
        let walls = numbered_walls(vec![Wall::segment(10.0, 0.0, -10.0, 0.0).infinite()]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(0.0, -5.0).moving(0.0, 1e-9)]);
        let report = engine().check_collisions(&walls, &mut disks, 0, 5 * SECOND);
        assert_eq!(report.events.len(), 1);
        assert!((disks[0].velocity().y + 0.9e-9).abs() < 1e-20);
    }

    #[test]
    fn test_bounded_face_hit() {
        let walls = numbered_walls(vec![Wall::segment(-10.0, 0.0, 10.0, 0.0)]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(0.0, 5.0).moving(0.0, -1e-9)]);
        let report = engine().check_collisions(&walls, &mut disks, 0, 5 * SECOND);
        assert_eq!(report.events.len(), 1);
        let CollisionEvent::DiskWall(event) = &report.events[0] else {
            panic!("expected a disk-wall collision");
        };
        assert_eq!(event.face, 0);
        assert!(event.edge.is_none());
        assert_eq!(event.time, 4 * SECOND);
    }

    #[test]
    fn test_corner_hit() {
        let walls = numbered_walls(vec![Wall::segment(0.0, 0.0, 10.0, 0.0)]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(-0.5, 5.0).moving(0.0, -1e-9)]);

        let report = engine().check_collisions(&walls, &mut disks, 0, 6 * SECOND);
        assert_eq!(report.events.len(), 1);
        let CollisionEvent::DiskWall(event) = &report.events[0] else {
            panic!("expected a disk-wall collision");
        };
        let edge = event.edge.expect("corner contact");
        assert_eq!(edge.end, FaceEnd::Start);
        assert_eq!(edge.point, Vector2D::ZERO);

        // center is one radius from the corner at contact
        let expected = (5.0 - 0.75f64.sqrt()) * 1e9;
        assert!((event.time as f64 - expected).abs() < 10.0);

        let v = disks[0].velocity();
        assert!(v.x < 0.0 && v.y > 0.0);
        assert!((v.value() - 0.9e-9).abs() < 1e-18);
    }

    #[test]
    fn test_miss_past_wall_end() {
        let walls = numbered_walls(vec![Wall::segment(0.0, 0.0, 10.0, 0.0)]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(-3.0, 5.0).moving(0.0, -1e-9)]);
        let report = engine().check_collisions(&walls, &mut disks, 0, 10 * SECOND);
        assert!(report.events.is_empty());
        assert_eq!(disks[0].velocity(), Vector2D::new(0.0, -1e-9));
    }

    #[test]
    fn test_fixed_disk_reflects_and_credits_player() {
        let mut fixed = Disk::new(1.0, 1.0).with_mass(Mass::Fixed);
        fixed.set_last_hit_player(2);
        let mut disks = numbered(vec![fixed, Disk::new(1.0, 1.0).at(5.0, 0.0).moving(-1e-9, 0.0)]);

        let report = engine().check_collisions(&[], &mut disks, 0, 4 * SECOND);
        assert_eq!(report.events.len(), 1);
        assert!((report.events[0].time() - 3 * SECOND).abs() <= MAX_COLLISION_TIME_ERROR);
        assert_eq!(report.events[0].velocity(), Vector2D::new(-1e-9, 0.0));

        assert_eq!(disks[0].velocity(), Vector2D::ZERO);
        assert_eq!(disks[0].position(), Vector2D::ZERO);
        assert!((disks[1].velocity().x - 0.9e-9).abs() < 1e-20);
        assert_eq!(disks[1].last_hit_player(), 2);
    }

    #[test]
    fn test_moving_fixed_disk_reflects_in_its_frame() {
        // fixed disk moving right at 1e-9 hits a resting disk
        let mut disks = numbered(vec![
            Disk::new(1.0, 1.0).with_mass(Mass::Fixed).moving(1e-9, 0.0),
            Disk::new(1.0, 1.0).at(3.0, 0.0),
        ]);
        engine().check_collisions(&[], &mut disks, 0, 2 * SECOND);
        // relative -1e-9 reflects to +1e-9, plus frame velocity 1e-9
        assert!((disks[1].velocity().x - 0.9 * 2e-9).abs() < 1e-18);
        assert_eq!(disks[0].velocity(), Vector2D::new(1e-9, 0.0));
        assert_eq!(disks[1].last_hit_player(), -1);
    }

    #[test]
    fn test_fixed_disk_ignores_destroyable_wall() {
        let walls = numbered_walls(vec![Wall::segment(-10.0, 0.0, 10.0, 0.0).destroyable(3)]);
        let mut disks = numbered(vec![
            Disk::new(1.0, 1.0).with_mass(Mass::Fixed).at(-5.0, 5.0).moving(0.0, -1e-9),
            Disk::new(1.0, 1.0).at(5.0, 5.0).moving(0.0, -1e-9),
        ]);
        let report = engine().check_collisions(&walls, &mut disks, 0, 5 * SECOND);
        assert_eq!(report.events.len(), 1);
        assert!(report.events[0].involves(DiskId(1)));
        assert_eq!(disks[0].velocity(), Vector2D::new(0.0, -1e-9));
    }

    #[test]
    fn test_circuit_breaker_stops_after_cap() {
        // disk wedged between two walls with 0.001 clearance on each side
        let walls = numbered_walls(vec![
            Wall::segment(-100.0, 0.0, 100.0, 0.0).infinite(),
            Wall::segment(100.0, 2.002, -100.0, 2.002).infinite(),
        ]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(0.0, 1.001).moving(0.0, -MAX_VELOCITY_VALUE)]);

        let report = engine().check_collisions(&walls, &mut disks, 0, 10_000_000);
        assert!(report.circuit_broken);
        assert_eq!(report.events.len(), MAX_COLLISIONS_PER_TICK);

        // alternating walls, strictly increasing times
        for pair in report.events.windows(2) {
            assert!(pair[0].time() < pair[1].time());
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_repeated_wall_contact_damps_speed() {
        let walls = numbered_walls(vec![
            Wall::segment(-100.0, 0.0, 100.0, 0.0).infinite(),
            Wall::segment(100.0, 2.002, -100.0, 2.002).infinite(),
        ]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(0.0, 1.001).moving(0.0, -MAX_VELOCITY_VALUE)]);
        let report = engine().check_collisions(&walls, &mut disks, 0, 10_000_000);

        // each wall is hit five times: exponents 1+2+...: 0.9^30 overall
        let expected = MAX_VELOCITY_VALUE * 0.9f64.powi(30);
        assert_eq!(report.events.len(), 10);
        assert!((disks[0].velocity().value() - expected).abs() < 1e-15);
    }

    #[test]
    fn test_simultaneous_infinite_wall_hits() {
        let walls = numbered_walls(vec![Wall::segment(-100.0, 0.0, 100.0, 0.0).infinite()]);
        let mut disks = numbered(vec![
            Disk::new(1.0, 1.0).at(-5.0, 5.0).moving(0.0, -1e-9),
            Disk::new(1.0, 1.0).at(5.0, 5.0).moving(0.0, -1e-9),
        ]);

        let report = engine().check_collisions(&walls, &mut disks, 0, 5 * SECOND);
        assert!(!report.circuit_broken);
        assert_eq!(report.events.len(), 2);
        assert!(report.events.iter().all(|e| e.time() == 4 * SECOND));
        assert!(report.events[0].involves(DiskId(0)));
        assert!(report.events[1].involves(DiskId(1)));

        for disk in &disks {
            assert!((disk.velocity().y - 0.9e-9).abs() < 1e-20);
        }
    }

    fn fixed_pair_contact(time: i64) -> Contact {
        Contact {
            disk: 0,
            other: 1,
            event: CollisionEvent::DiskDisk(DiskDiskCollision {
                time,
                point: Vector2D::new(1.0, 0.0),
                velocity: Vector2D::ZERO,
                disk1: DiskId(0),
                disk2: DiskId(1),
            }),
        }
    }

    #[test]
    fn test_repeated_fixed_contact_rebounds_fixed_disk() {
        let engine = engine();
        let setup = || {
            numbered(vec![
                Disk::new(1.0, 1.0).with_mass(Mass::Fixed).moving(1e-9, 0.0),
                Disk::new(1.0, 1.0).at(2.0, 0.0).moving(-1e-9, 0.0),
            ])
        };

        // first contact: the fixed disk keeps its velocity
        let mut disks = setup();
        engine.handle(&mut fixed_pair_contact(0), &[], &[], &mut disks);
        assert_eq!(disks[0].velocity(), Vector2D::new(1e-9, 0.0));
        assert!((disks[1].velocity().x - 0.9 * 3e-9).abs() < 1e-20);

        // repeated contact: the fixed disk bounces back at 0.4 of its speed
        let mut disks = setup();
        let earlier = [fixed_pair_contact(0)];
        engine.handle(&mut fixed_pair_contact(0), &earlier, &[], &mut disks);
        assert!((disks[0].velocity().x + FIXED_DISK_TRAP_REBOUND * 1e-9).abs() < 1e-24);
        assert_eq!(disks[0].position(), Vector2D::ZERO);
        // relative -0.6e-9 reflects to 0.6e-9, back in the table frame 0.2e-9
        assert!((disks[1].velocity().x - 0.9 * 0.2e-9).abs() < 1e-20);
        assert!(disks[1].velocity().y.abs() < 1e-24);
    }

    #[test]
    fn test_disk_trapped_between_fixed_disks() {
        // two paddles closing in on a resting puck
        let mut disks = numbered(vec![
            Disk::new(1.0, 1.0).with_mass(Mass::Fixed).at(-2.2, 0.0).moving(1e-9, 0.0),
            Disk::new(1.0, 1.0),
            Disk::new(1.0, 1.0).with_mass(Mass::Fixed).at(2.6, 0.0).moving(-1e-9, 0.0),
        ]);

        let report = engine().check_collisions(&[], &mut disks, 0, 20 * SECOND);
        assert!(report.circuit_broken);
        assert_eq!(report.events.len(), MAX_COLLISIONS_PER_TICK);
        assert!(
            report
                .events
                .iter()
                .all(|e| matches!(e, CollisionEvent::DiskDisk(_)) && e.involves(DiskId(1)))
        );
        for pair in report.events.windows(2) {
            assert!(pair[0].time() < pair[1].time());
        }

        // the puck alternates between paddles, each repeat flips the paddle at 0.4 of its speed
        let left = report.events.iter().filter(|e| e.involves(DiskId(0))).count();
        let right = report.events.iter().filter(|e| e.involves(DiskId(2))).count();
        assert_eq!((left, right), (5, 5));
        let rebound = (-FIXED_DISK_TRAP_REBOUND).powi(4);
        assert!((disks[0].velocity().x - 1e-9 * rebound).abs() < 1e-24);
        assert!((disks[2].velocity().x + 1e-9 * rebound).abs() < 1e-24);
        assert!(disks[1].velocity().value() > 0.0);
    }

    #[test]
    fn test_sunk_disk_pushed_out_of_face() {
        let engine = engine();
        let wall = Wall::segment(-10.0, 0.0, 10.0, 0.0).infinite();
        let mut event = DiskWallCollision {
            time: 0,
            point: Vector2D::ZERO,
            velocity: Vector2D::ZERO,
            disk: DiskId(0),
            wall: WallId(0),
            face: 0,
            edge: None,
        };

        // center half a radius from the face
        let mut disk = Disk::new(1.0, 1.0).at(0.0, 0.5).moving(0.0, -1e-9);
        engine.resolve_wall_face(&mut event, &mut disk, wall.front_face());
        let expected = 0.5 + (1.0 - 0.5 + EPSILON);
        assert!((disk.position().y - expected).abs() < 1e-15);
        assert!(disk.position().x.abs() < 1e-15);
        assert!((disk.velocity().y - 0.9e-9).abs() < 1e-20);

        // a disk clear of the face stays where it is
        let mut disk = Disk::new(1.0, 1.0).at(0.0, 1.5).moving(0.0, -1e-9);
        engine.resolve_wall_face(&mut event, &mut disk, wall.front_face());
        assert_eq!(disk.position(), Vector2D::new(0.0, 1.5));
    }

    #[test]
    fn test_custom_impulse_loss() {
        let engine = CollisionEngine::new(PhysicsConfig::default().with_impulse_loss(0.5));
        let walls = numbered_walls(vec![Wall::segment(-10.0, 0.0, 10.0, 0.0).infinite()]);
        let mut disks = numbered(vec![Disk::new(1.0, 1.0).at(0.0, 5.0).moving(0.0, -1e-9)]);
        engine.check_collisions(&walls, &mut disks, 0, 5 * SECOND);
        assert!((disks[0].velocity().y - 0.5e-9).abs() < 1e-20);
    }

    #[test]
    fn test_sanity_check_reports_overlap() {
        let disks = vec![Disk::new(1.0, 1.0), Disk::new(1.0, 1.0).at(1.0, 0.0)];
        assert!(!sanity_check(&disks, &[], SANITY_TOLERANCE));
        let disks = vec![Disk::new(1.0, 1.0), Disk::new(1.0, 1.0).at(2.5, 0.0)];
        assert!(sanity_check(&disks, &[], SANITY_TOLERANCE));
        let walls = vec![Wall::segment(0.0, 0.0, 10.0, 0.0)];
        assert!(!sanity_check(&[Disk::new(1.0, 1.0).at(0.1, 0.1)], &walls, SANITY_TOLERANCE));
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(0.0, 1.0), 3);
        assert_eq!(sample_count(2.0, 1.0), 10);
        assert_eq!(sample_count(1.0, 0.0), i64::MAX);
    }

    proptest! {
        #[test]
        fn disk_collision_reverses_central_relative_velocity(
            angle in 0.0f64..std::f64::consts::TAU,
            m1 in 0.05f64..5.0,
            m2 in 0.05f64..5.0,
            v1x in -1e-8f64..1e-8, v1y in -1e-8f64..1e-8,
            v2x in -1e-8f64..1e-8, v2y in -1e-8f64..1e-8,
        ) {
            let engine = engine();
            let dir = Vector2D::new(angle.cos(), angle.sin());
            let mut disk1 = Disk::new(1.0, 1.0).with_mass(Mass::Mobile(m1)).moving(v1x, v1y);
            let mut disk2 = Disk::new(0.5, 1.0).with_mass(Mass::Mobile(m2)).moving(v2x, v2y);
            disk2.set_position(dir * 1.5);
            let before_rel = disk1.velocity() - disk2.velocity();
            let before1 = disk1.velocity();
            let before2 = disk2.velocity();

            let mut event = DiskDiskCollision {
                time: 0,
                point: dir * 1.0,
                velocity: Vector2D::ZERO,
                disk1: DiskId(0),
                disk2: DiskId(1),
            };
            engine.resolve_disks(&mut event, &mut disk1, &mut disk2);

            let loss = engine.config().impulse_loss;
            let after_rel = disk1.velocity() - disk2.velocity();
            let tangent = dir.perp();
            prop_assert!((after_rel.dot(dir) + loss * before_rel.dot(dir)).abs() < 1e-20);
            prop_assert!((disk1.velocity().dot(tangent) - loss * before1.dot(tangent)).abs() < 1e-20);
            prop_assert!((disk2.velocity().dot(tangent) - loss * before2.dot(tangent)).abs() < 1e-20);
        }

        #[test]
        fn wall_face_reflection_scales_normal_component(
            vx in -3e-8f64..3e-8,
            vy in -3e-8f64..-1e-12,
        ) {
            let engine = engine();
            let wall = Wall::segment(-10.0, 0.0, 10.0, 0.0).infinite();
            let mut disk = Disk::new(1.0, 1.0).at(0.0, 1.0).moving(vx, vy);
            let incoming = disk.velocity();
            let mut event = DiskWallCollision {
                time: 0,
                point: Vector2D::ZERO,
                velocity: Vector2D::ZERO,
                disk: DiskId(0),
                wall: WallId(0),
                face: 0,
                edge: None,
            };
            engine.resolve_wall_face(&mut event, &mut disk, wall.front_face());

            let normal = wall.front_face().normal_vector();
            let loss = engine.config().impulse_loss;
            prop_assert!((disk.velocity().dot(normal) + loss * incoming.dot(normal)).abs() < 1e-20);
            prop_assert_eq!(event.velocity, incoming);
        }
    }
}
