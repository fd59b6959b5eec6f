//! Thread-safe simulation handle and the periodic tick driver
//!
//! One coarse lock guards the whole simulation for the duration of a tick.
//! Readers that need a consistent snapshot across several calls (network
//! serialization) hold an [`UpdateBlock`], which keeps new ticks from
//! starting until it is dropped.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::simulation::{Simulation, TickReport};
use crate::wire::{self, WireError};

pub struct SharedSimulation {
    sim: Mutex<Simulation>,
    /// Number of live update blocks
    blocks: Mutex<u32>,
    unblocked: Condvar,
}

impl SharedSimulation {
    pub fn new(sim: Simulation) -> Self {
        Self {
            sim: Mutex::new(sim),
            blocks: Mutex::new(0),
            unblocked: Condvar::new(),
        }
    }

    /// Exclusive access for registration, lookups and manual ticks
    pub fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.sim.lock()
    }

    /// Tick to the current clock time, waiting while updates are blocked
    pub fn update(&self) -> TickReport {
        let mut blocks = self.blocks.lock();
        while *blocks > 0 {
            self.unblocked.wait(&mut blocks);
        }
        let mut sim = self.sim.lock();
        drop(blocks);
        sim.update()
    }

    /// Keep ticks from starting until the returned guard is dropped
    ///
    /// Blocks nest. Do not tick from the same thread while holding one.
    pub fn block_updates(&self) -> UpdateBlock<'_> {
        *self.blocks.lock() += 1;
        UpdateBlock { shared: self }
    }

    pub fn is_blocked(&self) -> bool {
        *self.blocks.lock() > 0
    }

    /// Write the moving disks' state as one consistent snapshot
    pub fn write_simulation_update(&self, writer: &mut impl Write) -> Result<(), WireError> {
        let _block = self.block_updates();
        let sim = self.sim.lock();
        wire::write_simulation_update(&sim, writer)
    }

    /// Apply a snapshot written by [`SharedSimulation::write_simulation_update`]
    pub fn read_simulation_update(&self, reader: &mut impl Read) -> Result<usize, WireError> {
        let _block = self.block_updates();
        let mut sim = self.sim.lock();
        wire::read_simulation_update(&mut sim, reader)
    }

    fn release_block(&self) {
        let mut blocks = self.blocks.lock();
        debug_assert!(*blocks > 0);
        *blocks = blocks.saturating_sub(1);
        if *blocks == 0 {
            self.unblocked.notify_all();
        }
    }
}

/// Guard returned by [`SharedSimulation::block_updates`]
#[must_use = "updates are only blocked while the guard is alive"]
pub struct UpdateBlock<'a> {
    shared: &'a SharedSimulation,
}

impl Drop for UpdateBlock<'_> {
    fn drop(&mut self) {
        self.shared.release_block();
    }
}

/// Ticks a shared simulation at a fixed rate on a background thread
///
/// Dropping the driver stops the thread and waits for it.
pub struct Driver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Driver {
    pub const THREAD_NAME: &'static str = "Simulation Update";

    /// Start ticking every `period`
    ///
    /// Use [`crate::PhysicsConfig::tick_period`] to derive the period; an
    /// uncapped configuration has none and is ticked by the caller instead.
    pub fn start(shared: Arc<SharedSimulation>, period: Duration) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || {
                log::info!("Simulation driver started, period {:?}", period);
                let mut next = Instant::now();
                let mut ticks: u64 = 0;
                while !stop_flag.load(Ordering::Acquire) {
                    shared.update();
                    ticks += 1;

                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        // running behind: skip missed ticks
                        next = now;
                    }
                }
                log::info!("Simulation driver stopped after {} ticks", ticks);
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop ticking and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Simulation driver thread panicked");
            }
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
