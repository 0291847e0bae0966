use ba_common::math::{ChunkPos, Pos};
use std::collections::HashMap;

/// Tracks how many block updates are pending at every cell, per world. This
/// is what lets [`queue_block_once`](super::Physics::queue_block_once)
/// suppress floods of updates at a single coordinate.
///
/// Counters saturate at `u16::MAX` (with a warning) and never underflow; a
/// decrement on a zero counter is an invariant violation that gets logged
/// and ignored, so one bad caller can't wedge the index.
pub(super) struct Membership {
  worlds: HashMap<u32, HashMap<ChunkPos, MemChunk>>,
}

struct MemChunk {
  subs: [Option<Box<MemSub>>; 16],
}

struct MemSub {
  counts: [u16; 4096],
}

/// Cell index within a sub-chunk.
fn idx(pos: Pos) -> usize {
  (((pos.y() & 15) << 8) | ((pos.z() & 15) << 4) | (pos.x() & 15)) as usize
}

impl Membership {
  pub fn new() -> Self { Membership { worlds: HashMap::new() } }

  /// Returns true if at least one update is pending at the given cell.
  pub fn has(&self, wid: u32, pos: Pos) -> bool {
    if !(0..256).contains(&pos.y()) {
      return false;
    }
    let chunks = match self.worlds.get(&wid) {
      Some(c) => c,
      None => return false,
    };
    let ch = match chunks.get(&pos.chunk()) {
      Some(c) => c,
      None => return false,
    };
    match &ch.subs[pos.chunk_y() as usize] {
      Some(sub) => sub.counts[idx(pos)] > 0,
      None => false,
    }
  }

  /// Counts one more pending update at the given cell.
  pub fn add(&mut self, wid: u32, pos: Pos) {
    if !(0..256).contains(&pos.y()) {
      return;
    }
    let ch = self.worlds.entry(wid).or_default().entry(pos.chunk()).or_insert_with(|| MemChunk {
      subs: Default::default(),
    });
    let sub = ch.subs[pos.chunk_y() as usize]
      .get_or_insert_with(|| Box::new(MemSub { counts: [0; 4096] }));
    let count = &mut sub.counts[idx(pos)];
    if *count < u16::MAX {
      *count += 1;
    } else {
      warn!("membership counter overflow at {pos} in world {wid}");
    }
  }

  /// Counts one pending update at the given cell as done.
  pub fn remove(&mut self, wid: u32, pos: Pos) {
    if !(0..256).contains(&pos.y()) {
      return;
    }
    let sub = self
      .worlds
      .get_mut(&wid)
      .and_then(|chunks| chunks.get_mut(&pos.chunk()))
      .and_then(|ch| ch.subs[pos.chunk_y() as usize].as_mut());
    if let Some(sub) = sub {
      let count = &mut sub.counts[idx(pos)];
      if *count > 0 {
        *count -= 1;
        return;
      }
    }
    warn!("membership counter underflow at {pos} in world {wid}");
  }

  /// Returns the raw counter at a cell. Only interesting to tests and debug
  /// logging.
  pub fn count(&self, wid: u32, pos: Pos) -> u16 {
    if !(0..256).contains(&pos.y()) {
      return 0;
    }
    self
      .worlds
      .get(&wid)
      .and_then(|chunks| chunks.get(&pos.chunk()))
      .and_then(|ch| ch.subs[pos.chunk_y() as usize].as_ref())
      .map(|sub| sub.counts[idx(pos)])
      .unwrap_or(0)
  }
}
