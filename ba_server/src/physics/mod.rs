//! The physics scheduler. This drives every delayed block update and every
//! entity tick on the server.
//!
//! All updates go through one MPMC queue, drained by a pool of worker
//! threads. Each worker wakes once per 50 ms tick and processes a batch.
//! Block updates are deduplicated per-cell through a membership index, so a
//! cascade of `queue_block_once` calls at one coordinate only ever schedules
//! one update.

use crate::world::World;
use ba_common::math::Pos;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use std::{
  io,
  sync::Arc,
  time::{Duration, Instant},
};

mod mem;
mod worker;

#[cfg(test)]
mod tests;

use mem::Membership;
use worker::Worker;

/// The length of one simulation tick.
pub const TICK_TIME: Duration = Duration::from_millis(50);

/// Hard cap on the worker pool. More threads than this just fight over the
/// queue.
const MAX_WORKERS: usize = 20;

/// A function attached to a block update. Runs instead of the block's
/// registered behavior. The rng belongs to the worker; callbacks must not
/// retain it.
pub type BlockCallback = fn(&Arc<World>, Pos, i32, &mut SmallRng);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
  None,
  /// Stochastic decay: on each tick, with probability `1/(val+1)`, the block
  /// is replaced with air and the update is consumed.
  Dissipate,
  /// Reserved. What dropping means is up to the block behavior.
  Drop,
}

/// One slot in an update's action strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
  pub kind:   ActionKind,
  /// How many more ticks this action lives for. [`Action::PERMANENT`] never
  /// retires, and keeps the update re-queueing forever.
  pub expire: u16,
  pub val:    i16,
}

impl Action {
  pub const NONE: Action = Action { kind: ActionKind::None, expire: 0, val: 0 };
  pub const PERMANENT: u16 = 0xFFFF;

  /// A permanent dissipate action with the given odds.
  pub const fn dissipate(val: i16) -> Action {
    Action { kind: ActionKind::Dissipate, expire: Action::PERMANENT, val }
  }
}

/// A fixed strip of up to 8 actions carried by an update. The first
/// [`ActionKind::None`] slot terminates the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
  pub actions: [Action; 8],
}

impl Default for Params {
  fn default() -> Self { Params::new() }
}

impl Params {
  pub const fn new() -> Self { Params { actions: [Action::NONE; 8] } }

  /// Returns self with the given action added in the first free slot. Does
  /// nothing if the strip is full.
  #[must_use = "with returns a modified version of self"]
  pub fn with(mut self, action: Action) -> Self {
    for slot in self.actions.iter_mut() {
      if slot.kind == ActionKind::None {
        *slot = action;
        break;
      }
    }
    self
  }
}

#[derive(Clone, Copy)]
enum UpdateData {
  Block { pos: Pos, extra: i32, cb: Option<BlockCallback> },
  Entity { eid: i32, persistent: bool },
}

/// A scheduled piece of work: a block update at a coordinate, or an entity
/// tick.
#[derive(Clone)]
struct Update {
  world:    Arc<World>,
  data:     UpdateData,
  params:   Params,
  /// Tick delay, in ticks, always at least 1. The first firing happens
  /// `delay - 1` ticks after queueing; re-queues wait the full `delay`.
  delay:    u32,
  /// The update must not be processed before this time. Workers that pop it
  /// early push it back.
  ready_at: Instant,
}

/// Fatal startup errors. Everything else the scheduler absorbs at the
/// worker boundary.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
  #[error("could not spawn worker thread: {0}")]
  WorkerSpawn(#[from] io::Error),
}

/// Owns the update queue, the membership index, and the worker pool. One of
/// these is shared by every world on the server; worlds and tests get their
/// own instance so universes stay isolated.
pub struct Physics {
  tx:               Sender<Update>,
  rx:               Receiver<Update>,
  mem:              Mutex<Membership>,
  workers:          Mutex<Vec<Worker>>,
  updates_per_tick: usize,
}

impl Physics {
  pub fn new(updates_per_tick: usize) -> Arc<Self> {
    let (tx, rx) = crossbeam_channel::unbounded();
    Arc::new(Physics {
      tx,
      rx,
      mem: Mutex::new(Membership::new()),
      workers: Mutex::new(vec![]),
      updates_per_tick,
    })
  }

  /// Changes the number of worker threads to utilize. Growing spawns fresh
  /// workers that immediately enter the tick loop; shrinking tears down
  /// exactly `len - count` workers, each of which exits at its next tick
  /// boundary.
  pub fn set_worker_count(self: &Arc<Self>, count: usize) -> Result<(), InitError> {
    let count = count.min(MAX_WORKERS);
    let mut workers = self.workers.lock();
    while workers.len() > count {
      // Worker::drop signals the thread and joins it.
      workers.pop();
    }
    while workers.len() < count {
      workers.push(Worker::spawn(Arc::downgrade(self))?);
    }
    Ok(())
  }

  pub fn worker_count(&self) -> usize { self.workers.lock().len() }

  /// How many updates are sitting in the queue right now. Includes updates
  /// that are not ready yet.
  pub fn pending(&self) -> usize { self.rx.len() }

  /// Queues a block update. The update first becomes ready after
  /// `50 ms * (tick_delay - 1)`, and always counts against the membership
  /// counter at its cell.
  pub fn queue_block(
    &self,
    world: &Arc<World>,
    pos: Pos,
    extra: i32,
    tick_delay: u32,
    params: Option<Params>,
    cb: Option<BlockCallback>,
  ) {
    let delay = tick_delay.max(1);
    let mut mem = self.mem.lock();
    mem.add(world.wid(), pos);
    self.push(Update {
      world: world.clone(),
      data: UpdateData::Block { pos, extra, cb },
      params: params.unwrap_or_default(),
      delay,
      ready_at: Instant::now() + TICK_TIME * (delay - 1),
    });
  }

  /// Queues a block update, unless one is already pending at the same cell.
  /// This is what cascading rules should call, so an avalanche of triggers
  /// collapses into a single scheduled update.
  pub fn queue_block_once(
    &self,
    world: &Arc<World>,
    pos: Pos,
    extra: i32,
    tick_delay: u32,
    params: Option<Params>,
    cb: Option<BlockCallback>,
  ) {
    let mut mem = self.mem.lock();
    if mem.has(world.wid(), pos) {
      return;
    }
    let delay = tick_delay.max(1);
    mem.add(world.wid(), pos);
    self.push(Update {
      world: world.clone(),
      data: UpdateData::Block { pos, extra, cb },
      params: params.unwrap_or_default(),
      delay,
      ready_at: Instant::now() + TICK_TIME * (delay - 1),
    });
  }

  /// Queues an entity tick. If `persistent` is set the update re-queues
  /// itself every `tick_delay` ticks until the entity's `tick` reports a
  /// terminal state.
  pub fn queue_entity(
    &self,
    world: &Arc<World>,
    eid: i32,
    persistent: bool,
    tick_delay: u32,
    params: Option<Params>,
  ) {
    let delay = tick_delay.max(1);
    self.push(Update {
      world: world.clone(),
      data: UpdateData::Entity { eid, persistent },
      params: params.unwrap_or_default(),
      delay,
      ready_at: Instant::now() + TICK_TIME * (delay - 1),
    });
  }

  fn push(&self, u: Update) {
    // The queue is unbounded, so this only fails if the physics manager is
    // being torn down.
    let _ = self.tx.send(u);
  }

  /// The membership counter at a cell. Zero means no block update is
  /// pending there.
  pub fn count_at(&self, world: &World, pos: Pos) -> u16 {
    self.mem.lock().count(world.wid(), pos)
  }
}
