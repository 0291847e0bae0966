use crate::block::Block;
use ba_common::math::{ChunkPos, Pos};
use parking_lot::Mutex;
use std::collections::HashSet;

/// A 16x256x16 column of blocks, plus a roster of the entities currently
/// inside it.
///
/// Vertically the column is split into 16 sections. Sections are allocated
/// the first time something writes into them, and stay allocated for the
/// life of the chunk, so a section pointer observed once is stable.
pub struct Chunk {
  pos:      ChunkPos,
  sections: Mutex<[Option<Box<Section>>; 16]>,
  entities: Mutex<HashSet<i32>>,
}

struct Section {
  blocks: [u16; 4096],
}

/// Cell index within a section. Only the low 4 bits of each coordinate are
/// used, so absolute and chunk-relative positions both work.
fn idx(pos: Pos) -> usize {
  (((pos.y() & 15) << 8) | ((pos.z() & 15) << 4) | (pos.x() & 15)) as usize
}

impl Section {
  fn new() -> Box<Self> { Box::new(Section { blocks: [0; 4096] }) }
}

impl Chunk {
  pub fn new(pos: ChunkPos) -> Self {
    Chunk {
      pos,
      sections: Mutex::new(Default::default()),
      entities: Mutex::new(HashSet::new()),
    }
  }

  pub fn pos(&self) -> ChunkPos { self.pos }

  /// Reads the block at the given position. X and Z are interpreted through
  /// their low 4 bits; Y must be within `0..256`, and anything in an
  /// unallocated section is air.
  pub fn get_block(&self, pos: Pos) -> Block {
    if !(0..256).contains(&pos.y()) {
      return Block::AIR;
    }
    let sections = self.sections.lock();
    match &sections[pos.chunk_y() as usize] {
      Some(s) => Block::from_u16(s.blocks[idx(pos)]),
      None => Block::AIR,
    }
  }

  /// Writes the block at the given position, allocating the section if this
  /// is the first write into it. Writes outside `0..256` are dropped.
  pub fn set_block(&self, pos: Pos, b: Block) {
    if !(0..256).contains(&pos.y()) {
      return;
    }
    let mut sections = self.sections.lock();
    let s = sections[pos.chunk_y() as usize].get_or_insert_with(Section::new);
    s.blocks[idx(pos)] = b.to_u16();
  }

  /// Fills one full horizontal layer. Terrain generators use this; it only
  /// takes the section lock once.
  pub fn fill_layer(&self, y: i32, b: Block) {
    if !(0..256).contains(&y) {
      return;
    }
    let mut sections = self.sections.lock();
    let s = sections[(y >> 4) as usize].get_or_insert_with(Section::new);
    let v = b.to_u16();
    let base = ((y & 15) << 8) as usize;
    s.blocks[base..base + 256].fill(v);
  }

  /// Snapshots the block data for a chunk payload packet. Unallocated
  /// sections come out as `None`.
  pub fn serialize_sections(&self) -> Vec<Option<Vec<u16>>> {
    let sections = self.sections.lock();
    sections.iter().map(|s| s.as_ref().map(|s| s.blocks.to_vec())).collect()
  }

  /// Adds an entity to this chunk's roster.
  pub fn add_entity(&self, eid: i32) { self.entities.lock().insert(eid); }
  /// Removes an entity from this chunk's roster.
  pub fn remove_entity(&self, eid: i32) { self.entities.lock().remove(&eid); }

  /// Snapshots the entity roster. A snapshot (rather than a callback) keeps
  /// the roster lock out of spawn/despawn call chains.
  pub fn entities(&self) -> Vec<i32> { self.entities.lock().iter().copied().collect() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lazy_sections() {
    let c = Chunk::new(ChunkPos::new(0, 0));
    assert_eq!(c.get_block(Pos::new(3, 70, 5)), Block::AIR);
    assert!(c.serialize_sections().iter().all(|s| s.is_none()));

    c.set_block(Pos::new(3, 70, 5), Block::new(1, 0));
    assert_eq!(c.get_block(Pos::new(3, 70, 5)), Block::new(1, 0));
    let sections = c.serialize_sections();
    assert!(sections[4].is_some());
    assert_eq!(sections.iter().filter(|s| s.is_some()).count(), 1);
  }

  #[test]
  fn rel_and_abs_positions_match() {
    let c = Chunk::new(ChunkPos::new(-2, 3));
    c.set_block(Pos::new(-17, 64, 49), Block::new(12, 0));
    assert_eq!(c.get_block(Pos::new(15, 64, 1)), Block::new(12, 0));
  }

  #[test]
  fn out_of_range_y() {
    let c = Chunk::new(ChunkPos::new(0, 0));
    c.set_block(Pos::new(0, 256, 0), Block::new(1, 0));
    c.set_block(Pos::new(0, -1, 0), Block::new(1, 0));
    assert_eq!(c.get_block(Pos::new(0, 256, 0)), Block::AIR);
    assert_eq!(c.get_block(Pos::new(0, -1, 0)), Block::AIR);
  }

  #[test]
  fn roster() {
    let c = Chunk::new(ChunkPos::new(0, 0));
    c.add_entity(5);
    c.add_entity(5);
    c.add_entity(7);
    let mut e = c.entities();
    e.sort_unstable();
    assert_eq!(e, vec![5, 7]);
    c.remove_entity(5);
    assert_eq!(c.entities(), vec![7]);
  }
}
