use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt;

mod behavior;

pub use behavior::{Behavior, BehaviorStore};

/// A block: a 12-bit id plus a 4-bit metadata nibble. Blocks are passed
/// around by value, and packed into a `u16` inside chunk sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  pub id:   u16,
  pub meta: u8,
}

impl Default for Block {
  fn default() -> Self { Block::AIR }
}

impl fmt::Display for Block {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Block({}:{})", self.id, self.meta)
  }
}

impl Block {
  /// The empty block.
  pub const AIR: Block = Block { id: 0, meta: 0 };
  /// Returned when an id cannot be parsed. This is never stored in a chunk.
  pub const UNKNOWN_ID: u16 = 0xFFF;

  pub const fn new(id: u16, meta: u8) -> Self { Block { id, meta: meta & 0xF } }

  /// Creates a block from a kind, with zeroed metadata.
  pub const fn from_kind(kind: Kind) -> Self { Block { id: kind as u16, meta: 0 } }

  /// Packs this block into a chunk section cell.
  #[inline(always)]
  pub const fn to_u16(&self) -> u16 { (self.id << 4) | self.meta as u16 }
  /// Unpacks a chunk section cell.
  #[inline(always)]
  pub const fn from_u16(v: u16) -> Self { Block { id: v >> 4, meta: (v & 0xF) as u8 } }

  pub fn is_air(&self) -> bool { self.id == 0 }

  /// Returns the kind for this block's id, or [`Kind::Unknown`] if the id is
  /// not recognized.
  pub fn kind(&self) -> Kind { Kind::from_u16(self.id).unwrap_or(Kind::Unknown) }
}

/// Every block id this server knows how to reason about. Ids the server has
/// no rules for still flow through chunks untouched; they just map to
/// [`Kind::Unknown`] when looked up here.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, FromPrimitive)]
pub enum Kind {
  Air = 0,
  Stone,
  Grass,
  Dirt,
  Cobblestone,
  Planks,
  Sapling,
  Bedrock,
  Water,
  StillWater,
  Lava,
  StillLava,
  Sand,
  Gravel,
  GoldOre,
  IronOre,
  CoalOre,
  Log,
  Leaves,

  Unknown = Block::UNKNOWN_ID as isize,
}

impl Kind {
  pub fn from_u16(id: u16) -> Option<Kind> { Kind::from_u32(id.into()) }

  pub const fn id(&self) -> u16 { *self as u16 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn packing() {
    let b = Block::new(18, 3);
    assert_eq!(Block::from_u16(b.to_u16()), b);
    assert_eq!(Block::AIR.to_u16(), 0);
    assert_eq!(Block::from_u16(0), Block::AIR);
  }

  #[test]
  fn kinds() {
    assert_eq!(Block::new(12, 0).kind(), Kind::Sand);
    assert_eq!(Block::new(500, 0).kind(), Kind::Unknown);
    assert_eq!(Kind::Leaves.id(), 18);
  }
}
