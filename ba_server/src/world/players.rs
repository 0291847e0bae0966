use crate::player::Player;
use ba_common::math::ChunkPos;
use std::{
  collections::{hash_map::Values, HashMap},
  iter::Iterator,
  ops::{Deref, DerefMut},
  sync::Arc,
};

/// All the players in one world, keyed by entity id.
pub struct PlayersMap {
  inner: HashMap<i32, Arc<Player>>,
}

impl PlayersMap {
  pub fn new() -> Self { PlayersMap { inner: HashMap::new() } }

  pub fn iter(&self) -> PlayersIter<'_> {
    PlayersIter { values: self.inner.values(), pos: None, eid: None }
  }
}

impl Default for PlayersMap {
  fn default() -> Self { PlayersMap::new() }
}

impl Deref for PlayersMap {
  type Target = HashMap<i32, Arc<Player>>;

  fn deref(&self) -> &Self::Target { &self.inner }
}

impl DerefMut for PlayersMap {
  fn deref_mut(&mut self) -> &mut Self::Target { &mut self.inner }
}

pub struct PlayersIter<'a> {
  values: Values<'a, i32, Arc<Player>>,
  // The chunk that must be in view
  pos:    Option<ChunkPos>,
  // The eid that must be skipped
  eid:    Option<i32>,
}

impl PlayersIter<'_> {
  /// Only yields players whose streaming window covers the given chunk.
  pub fn in_view(mut self, pos: ChunkPos) -> Self {
    self.pos = Some(pos);
    self
  }
  /// Skips the player with the given eid.
  pub fn not(mut self, eid: i32) -> Self {
    self.eid = Some(eid);
    self
  }
}

impl<'a> Iterator for PlayersIter<'a> {
  type Item = &'a Arc<Player>;

  fn next(&mut self) -> Option<Self::Item> {
    for p in &mut self.values {
      if let Some(eid) = self.eid {
        if p.eid() == eid {
          continue;
        }
      }
      if let Some(pos) = self.pos {
        if !p.can_see_chunk(pos) {
          continue;
        }
      }
      return Some(p);
    }
    None
  }
}
