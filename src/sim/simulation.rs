//! Authoritative simulation loop
//!
//! Owns the disks, walls and listeners. A tick resolves every collision on
//! the pre-tick trajectories, then commits final positions, then tells the
//! listeners what happened. Listeners get a [`ListenerContext`] to read the
//! world and queue changes, which are applied once notification is done.

use serde::{Deserialize, Serialize};

use super::clock::{MonotonicClock, SimClock};
use super::collision::{CollisionEngine, sanity_check};
use super::disk::{Disk, DiskId};
use super::event::{CollisionEvent, DiskDiskCollision, DiskWallCollision};
use super::wall::{Wall, WallId};
use crate::consts::SANITY_TOLERANCE;
use crate::settings::PhysicsConfig;

/// Handle returned when registering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

/// Receives every resolved collision, once per event, in resolution order
pub trait CollisionListener: Send {
    fn disk_wall_collision(&mut self, _collision: &DiskWallCollision, _ctx: &mut ListenerContext<'_>) {}
    fn disk_disk_collision(&mut self, _collision: &DiskDiskCollision, _ctx: &mut ListenerContext<'_>) {}
}

/// Called once per completed tick
pub trait SimulationListener: Send {
    fn simulation_updated(&mut self, time: i64, ctx: &mut ListenerContext<'_>);
}

impl<F> SimulationListener for F
where
    F: FnMut(i64, &mut ListenerContext<'_>) + Send,
{
    fn simulation_updated(&mut self, time: i64, ctx: &mut ListenerContext<'_>) {
        self(time, ctx)
    }
}

/// Outcome of one call to [`Simulation::update_to`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickStatus {
    /// Collisions resolved and positions committed
    Advanced,
    /// Time moved on, objects did not
    Paused,
    /// Requested time was not after the last tick; nothing changed
    Stale,
    /// Advanced, but the collision cap cut resolution short
    CircuitBroken,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    /// Simulation time after the tick
    pub time: i64,
    pub status: TickStatus,
    /// Collisions resolved in this tick, in order
    pub events: Vec<CollisionEvent>,
}

/// World mutation queued by a listener
enum Command {
    AddDisk { disk: Disk, participates: bool },
    RemoveDisk(DiskId),
    ModifyDisk(DiskId, Box<dyn FnOnce(&mut Disk) + Send>),
    AddWall(Wall),
    RemoveWall(WallId),
    HitWall(WallId),
    AddCollisionListener(ListenerId, Box<dyn CollisionListener>),
    AddSimulationListener(ListenerId, Box<dyn SimulationListener>),
    RemoveListener(ListenerId),
}

/// Everything a listener run left behind
struct Pending {
    commands: Vec<Command>,
    next_disk: u32,
    next_wall: u32,
    next_listener: u32,
}

/// Read access to the world plus a queue of deferred changes
///
/// Ids handed out here are final: a disk added through the context keeps
/// its id once the queue is applied.
pub struct ListenerContext<'a> {
    disks: &'a [Disk],
    walls: &'a [Wall],
    time: i64,
    current: Option<ListenerId>,
    next_disk: u32,
    next_wall: u32,
    next_listener: u32,
    commands: Vec<Command>,
}

impl<'a> ListenerContext<'a> {
    fn new(sim: &'a Simulation) -> Self {
        Self {
            disks: &sim.disks,
            walls: &sim.walls,
            time: sim.last_time,
            current: None,
            next_disk: sim.next_disk,
            next_wall: sim.next_wall,
            next_listener: sim.next_listener,
            commands: Vec::new(),
        }
    }

    fn into_pending(self) -> Pending {
        Pending {
            commands: self.commands,
            next_disk: self.next_disk,
            next_wall: self.next_wall,
            next_listener: self.next_listener,
        }
    }

    /// Simulation time of the tick being reported
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn disks(&self) -> &[Disk] {
        self.disks
    }

    pub fn walls(&self) -> &[Wall] {
        self.walls
    }

    pub fn disk(&self, id: DiskId) -> Option<&Disk> {
        self.disks.iter().find(|d| d.id() == id)
    }

    pub fn wall(&self, id: WallId) -> Option<&Wall> {
        self.walls.iter().find(|w| w.id() == id)
    }

    pub fn add_disk(&mut self, mut disk: Disk, participates: bool) -> DiskId {
        let id = DiskId(self.next_disk);
        self.next_disk += 1;
        disk.id = id;
        self.commands.push(Command::AddDisk { disk, participates });
        id
    }

    pub fn remove_disk(&mut self, id: DiskId) {
        self.commands.push(Command::RemoveDisk(id));
    }

    /// Change a disk once notification is over (e.g. reset the puck after a goal)
    pub fn modify_disk(&mut self, id: DiskId, change: impl FnOnce(&mut Disk) + Send + 'static) {
        self.commands.push(Command::ModifyDisk(id, Box::new(change)));
    }

    pub fn add_wall(&mut self, mut wall: Wall) -> WallId {
        let id = WallId(self.next_wall);
        self.next_wall += 1;
        wall.id = id;
        self.commands.push(Command::AddWall(wall));
        id
    }

    pub fn remove_wall(&mut self, id: WallId) {
        self.commands.push(Command::RemoveWall(id));
    }

    /// Count a hit on a destroyable wall, removing it once destroyed
    pub fn hit_wall(&mut self, id: WallId) {
        self.commands.push(Command::HitWall(id));
    }

    pub fn add_collision_listener(&mut self, listener: impl CollisionListener + 'static) -> ListenerId {
        let id = self.allocate_listener();
        self.commands
            .push(Command::AddCollisionListener(id, Box::new(listener)));
        id
    }

    pub fn add_simulation_listener(&mut self, listener: impl SimulationListener + 'static) -> ListenerId {
        let id = self.allocate_listener();
        self.commands
            .push(Command::AddSimulationListener(id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.commands.push(Command::RemoveListener(id));
    }

    /// Remove the listener currently being notified
    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.current {
            self.remove_listener(id);
        }
    }

    fn allocate_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }
}

/// The game state simulation: time, disks, walls, listeners
pub struct Simulation {
    config: PhysicsConfig,
    engine: CollisionEngine,
    clock: Box<dyn SimClock>,
    /// All known disks, in registration order
    disks: Vec<Disk>,
    /// Disks whose positions the simulation advances
    moving: Vec<DiskId>,
    walls: Vec<Wall>,
    collision_listeners: Vec<(ListenerId, Box<dyn CollisionListener>)>,
    simulation_listeners: Vec<(ListenerId, Box<dyn SimulationListener>)>,
    next_disk: u32,
    next_wall: u32,
    next_listener: u32,
    /// Time of the last tick (ns)
    last_time: i64,
    /// False while paused
    advancing: bool,
}

impl Simulation {
    /// Simulation on a real-time clock starting now
    pub fn new(config: PhysicsConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }

    pub fn with_clock(config: PhysicsConfig, clock: impl SimClock + 'static) -> Self {
        Self {
            engine: CollisionEngine::new(config.clone()),
            config,
            clock: Box::new(clock),
            disks: Vec::new(),
            moving: Vec::new(),
            walls: Vec::new(),
            collision_listeners: Vec::new(),
            simulation_listeners: Vec::new(),
            next_disk: 0,
            next_wall: 0,
            next_listener: 0,
            last_time: 0,
            advancing: true,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Register a disk; non-participating disks (e.g. player paddles moved
    /// by their controller) collide but are never advanced by the simulation
    pub fn add_disk(&mut self, mut disk: Disk, participates: bool) -> DiskId {
        let id = DiskId(self.next_disk);
        self.next_disk += 1;
        disk.id = id;
        self.insert_disk(disk, participates);
        id
    }

    fn insert_disk(&mut self, mut disk: Disk, participates: bool) {
        disk.set_timestamp_ns(self.last_time);
        log::debug!("Added {}", disk);
        if participates {
            self.moving.push(disk.id());
        }
        self.disks.push(disk);
    }

    pub fn remove_disk(&mut self, id: DiskId) -> Option<Disk> {
        self.moving.retain(|m| *m != id);
        let index = self.disks.iter().position(|d| d.id() == id)?;
        Some(self.disks.remove(index))
    }

    pub fn add_wall(&mut self, mut wall: Wall) -> WallId {
        let id = WallId(self.next_wall);
        self.next_wall += 1;
        wall.id = id;
        self.walls.push(wall);
        id
    }

    pub fn remove_wall(&mut self, id: WallId) -> Option<Wall> {
        let index = self.walls.iter().position(|w| w.id() == id)?;
        Some(self.walls.remove(index))
    }

    /// Count a hit on a destroyable wall
    ///
    /// Returns true if the hit destroyed the wall, which is then removed.
    pub fn hit_wall(&mut self, id: WallId) -> bool {
        let Some(index) = self.walls.iter().position(|w| w.id() == id) else {
            log::warn!("Could not get wall {}", id.0);
            return false;
        };
        let Some(durability) = self.walls[index].durability_mut() else {
            return false;
        };
        if !durability.wall_was_hit() {
            return false;
        }
        let wall = self.walls.remove(index);
        log::info!("Destroyed {}", wall);
        true
    }

    pub fn disk(&self, id: DiskId) -> Option<&Disk> {
        self.disks.iter().find(|d| d.id() == id)
    }

    pub fn disk_mut(&mut self, id: DiskId) -> Option<&mut Disk> {
        self.disks.iter_mut().find(|d| d.id() == id)
    }

    pub fn wall(&self, id: WallId) -> Option<&Wall> {
        self.walls.iter().find(|w| w.id() == id)
    }

    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Disks advanced by the simulation, in registration order
    pub fn moving_disks(&self) -> impl Iterator<Item = &Disk> + '_ {
        self.moving.iter().filter_map(|id| self.disk(*id))
    }

    pub(crate) fn moving_disk_ids(&self) -> &[DiskId] {
        &self.moving
    }

    pub fn participates(&self, id: DiskId) -> bool {
        self.moving.contains(&id)
    }

    pub fn add_collision_listener(&mut self, listener: impl CollisionListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.collision_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn add_simulation_listener(&mut self, listener: impl SimulationListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.simulation_listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if no listener had this id
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.collision_listeners.len() + self.simulation_listeners.len();
        self.collision_listeners.retain(|(l, _)| *l != id);
        self.simulation_listeners.retain(|(l, _)| *l != id);
        before != self.collision_listeners.len() + self.simulation_listeners.len()
    }

    pub fn toggle_pause(&mut self) {
        self.advancing = !self.advancing;
        log::info!(
            "Simulation {}",
            if self.advancing { "running" } else { "paused" }
        );
    }

    pub fn is_paused(&self) -> bool {
        !self.advancing
    }

    /// Time of the last tick (ns since the clock epoch)
    pub fn simulation_time(&self) -> i64 {
        self.last_time
    }

    /// Fresh reading of the simulation clock
    pub fn current_time(&self) -> i64 {
        self.clock.now_ns()
    }

    /// Tick to the current clock time
    pub fn update(&mut self) -> TickReport {
        let now = self.clock.now_ns();
        self.update_to(now)
    }

    /// Advance the simulation to `new_time`
    ///
    /// A time at or before the last tick is rejected: nothing moves and no
    /// listener is called.
    pub fn update_to(&mut self, new_time: i64) -> TickReport {
        if new_time <= self.last_time {
            log::warn!(
                "Ignoring time in the past: {}ns <= {}ns",
                new_time,
                self.last_time
            );
            return TickReport {
                time: self.last_time,
                status: TickStatus::Stale,
                events: Vec::new(),
            };
        }

        let mut status = TickStatus::Paused;
        let mut events = Vec::new();

        if self.advancing {
            self.check_sanity("before updating");

            let report = self.engine.check_collisions(
                &self.walls,
                &mut self.disks,
                self.last_time,
                new_time,
            );
            self.check_sanity("after handling collisions");

            for id in &self.moving {
                if let Some(disk) = self.disks.iter_mut().find(|d| d.id() == *id) {
                    disk.update(new_time);
                }
            }
            self.check_sanity("after updating positions");

            status = if report.circuit_broken {
                TickStatus::CircuitBroken
            } else {
                TickStatus::Advanced
            };
            events = report.events;
        }

        // stamp everything, including disks the simulation does not move
        for disk in &mut self.disks {
            disk.set_timestamp_ns(new_time);
        }
        self.last_time = new_time;

        self.notify(&events);

        TickReport {
            time: new_time,
            status,
            events,
        }
    }

    fn check_sanity(&self, stage: &str) {
        if self.config.sanity_checks
            && !sanity_check(&self.disks, &self.walls, SANITY_TOLERANCE)
        {
            log::warn!("Insane {} (last tick {}ns)", stage, self.last_time);
        }
    }

    /// Dispatch to listeners, then apply what they queued
    fn notify(&mut self, events: &[CollisionEvent]) {
        let mut collision_listeners = std::mem::take(&mut self.collision_listeners);
        let mut simulation_listeners = std::mem::take(&mut self.simulation_listeners);

        let mut ctx = ListenerContext::new(self);
        for event in events {
            for (id, listener) in collision_listeners.iter_mut() {
                ctx.current = Some(*id);
                match event {
                    CollisionEvent::DiskWall(collision) => {
                        listener.disk_wall_collision(collision, &mut ctx)
                    }
                    CollisionEvent::DiskDisk(collision) => {
                        listener.disk_disk_collision(collision, &mut ctx)
                    }
                }
            }
        }
        for (id, listener) in simulation_listeners.iter_mut() {
            ctx.current = Some(*id);
            listener.simulation_updated(ctx.time, &mut ctx);
        }
        let pending = ctx.into_pending();

        self.collision_listeners = collision_listeners;
        self.simulation_listeners = simulation_listeners;
        self.apply(pending);
    }

    fn apply(&mut self, pending: Pending) {
        self.next_disk = self.next_disk.max(pending.next_disk);
        self.next_wall = self.next_wall.max(pending.next_wall);
        self.next_listener = self.next_listener.max(pending.next_listener);

        for command in pending.commands {
            match command {
                Command::AddDisk { disk, participates } => self.insert_disk(disk, participates),
                Command::RemoveDisk(id) => {
                    self.remove_disk(id);
                }
                Command::ModifyDisk(id, change) => match self.disk_mut(id) {
                    Some(disk) => change(disk),
                    None => log::warn!("Could not get disk {}", id.0),
                },
                Command::AddWall(wall) => self.walls.push(wall),
                Command::RemoveWall(id) => {
                    self.remove_wall(id);
                }
                Command::HitWall(id) => {
                    self.hit_wall(id);
                }
                Command::AddCollisionListener(id, listener) => {
                    self.collision_listeners.push((id, listener))
                }
                Command::AddSimulationListener(id, listener) => {
                    self.simulation_listeners.push((id, listener))
                }
                Command::RemoveListener(id) => {
                    self.remove_listener(id);
                }
            }
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}
