//! The chunk generation pipeline: a single background worker behind a FIFO
//! of requests. Streaming code queues chunks it wants materialized; the
//! worker loads or synthesizes them through the world map, then hands them
//! back to the requesting player.

use super::{Chunk, World};
use crate::player::Player;
use ba_common::math::ChunkPos;
use parking_lot::Mutex;
use std::{
  collections::VecDeque,
  io,
  ops::BitOr,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
  },
  thread,
  time::Duration,
};

/// Request/delivery flags for the generator pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenFlags(u8);

impl GenFlags {
  pub const NONE: GenFlags = GenFlags(0);
  /// Don't deliver the chunk to the requester; just make sure it exists.
  /// Used for precaching.
  pub const NODELIVER: GenFlags = GenFlags(1);
  /// Generate even if the requester no longer cares about the chunk.
  pub const NOABORT: GenFlags = GenFlags(2);
  /// Set on delivery when the request was dropped instead of fulfilled.
  pub const ABORTED: GenFlags = GenFlags(4);

  pub fn contains(&self, other: GenFlags) -> bool { self.0 & other.0 == other.0 }
}

impl BitOr for GenFlags {
  type Output = GenFlags;
  fn bitor(self, other: GenFlags) -> GenFlags { GenFlags(self.0 | other.0) }
}

struct GenRequest {
  // Weak, so a player who disconnects mid-queue doesn't get kept alive (or
  // worse, delivered to) by the pipeline.
  player: Weak<Player>,
  world:  Arc<World>,
  pos:    ChunkPos,
  flags:  GenFlags,
  /// Opaque token, returned verbatim in the delivery.
  extra:  i32,
}

pub struct ChunkGenerator {
  requests:  Arc<Mutex<VecDeque<GenRequest>>>,
  running:   Arc<AtomicBool>,
  handle:    Mutex<Option<thread::JoinHandle<()>>>,
  idle_rest: Duration,
  deep_rest: Duration,
}

impl ChunkGenerator {
  pub fn new(idle_rest_ms: u64, deep_rest_ms: u64) -> Self {
    ChunkGenerator {
      requests:  Arc::new(Mutex::new(VecDeque::new())),
      running:   Arc::new(AtomicBool::new(false)),
      handle:    Mutex::new(None),
      idle_rest: Duration::from_millis(idle_rest_ms),
      deep_rest: Duration::from_millis(deep_rest_ms),
    }
  }

  /// Starts the worker thread and begins accepting generation requests.
  pub fn start(&self) -> io::Result<()> {
    if self.running.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    let requests = self.requests.clone();
    let running = self.running.clone();
    let idle = self.idle_rest;
    let deep = self.deep_rest;
    let handle = thread::Builder::new()
      .name("chunk generator".into())
      .spawn(move || main_loop(requests, running, idle, deep))?;
    *self.handle.lock() = Some(handle);
    Ok(())
  }

  /// Stops the worker. The thread exits at its next idle check.
  pub fn stop(&self) {
    if !self.running.swap(false, Ordering::SeqCst) {
      return;
    }
    if let Some(h) = self.handle.lock().take() {
      let _ = h.join();
    }
  }

  /// Requests the chunk at the given coordinates to be generated. The
  /// player is then informed when it is ready, unless `NODELIVER` is set.
  pub fn request(
    &self,
    world: &Arc<World>,
    pos: ChunkPos,
    player: &Arc<Player>,
    flags: GenFlags,
    extra: i32,
  ) {
    self.requests.lock().push_back(GenRequest {
      player: Arc::downgrade(player),
      world: world.clone(),
      pos,
      flags,
      extra,
    });
  }

  /// How many requests are waiting. Useful for tests and debug output.
  pub fn backlog(&self) -> usize { self.requests.lock().len() }
}

impl Drop for ChunkGenerator {
  fn drop(&mut self) { self.stop(); }
}

/// Where everything happens.
fn main_loop(
  requests: Arc<Mutex<VecDeque<GenRequest>>>,
  running: Arc<AtomicBool>,
  idle_rest: Duration,
  deep_rest: Duration,
) {
  let mut idle_count: u32 = 0;
  while running.load(Ordering::SeqCst) {
    // Snapshot the request under the queue lock, then release it for the
    // (possibly slow) generation work.
    let req = requests.lock().pop_front();
    match req {
      Some(req) => {
        idle_count = 0;
        handle_request(req);
      }
      None => {
        idle_count += 1;
        if idle_count % 250 == 0 {
          thread::sleep(deep_rest);
        } else {
          thread::sleep(idle_rest);
        }
      }
    }
  }
}

fn handle_request(req: GenRequest) {
  let pl = match req.player.upgrade() {
    Some(pl) => pl,
    // The requester disconnected while queued. Nothing to deliver to.
    None => return,
  };

  if !req.flags.contains(GenFlags::NOABORT)
    && (pl.world().wid() != req.world.wid() || !pl.can_see_chunk(req.pos))
  {
    if !req.flags.contains(GenFlags::NODELIVER) {
      pl.deliver_chunk(&req.world, req.pos, None, req.flags | GenFlags::ABORTED, req.extra);
    }
    return;
  }

  // Precache requests skip chunks that already exist.
  if req.flags.contains(GenFlags::NODELIVER) && req.world.get_chunk(req.pos).is_some() {
    return;
  }

  let ch: Arc<Chunk> = req.world.load_chunk(req.pos);

  if !req.flags.contains(GenFlags::NODELIVER) {
    pl.deliver_chunk(&req.world, req.pos, Some(ch), req.flags, req.extra);
  }
}
