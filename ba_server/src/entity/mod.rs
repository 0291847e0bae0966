mod behavior;

pub use behavior::{Behavior, ItemBehavior, ShouldDespawn};

use crate::{net::cb, player::Player, world::World};
use ba_common::math::{FPos, Vec3};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Kind {
  Player,
  Item,
  Mob,
}

/// Position state for a server-controlled entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityPos {
  pub pos:       FPos,
  pub vel:       Vec3,
  pub yaw:       f32,
  pub pitch:     f32,
  pub on_ground: bool,
}

impl EntityPos {
  pub fn new(pos: FPos) -> Self {
    EntityPos { pos, vel: Vec3::default(), yaw: 0.0, pitch: 0.0, on_ground: false }
  }
}

/// Metadata sent along with entity spawn packets. The indices mean whatever
/// the protocol version says they mean; the core just carries them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
  entries: Vec<(u8, i32)>,
}

impl Metadata {
  pub fn new() -> Self { Metadata::default() }

  pub fn set(&mut self, index: u8, value: i32) {
    if let Some(e) = self.entries.iter_mut().find(|(i, _)| *i == index) {
      e.1 = value;
    } else {
      self.entries.push((index, value));
    }
  }

  pub fn get(&self, index: u8) -> Option<i32> {
    self.entries.iter().find(|(i, _)| *i == index).map(|(_, v)| *v)
  }
}

/// An entity or a player's id. This is how all entities are stored in a
/// world, and how players get treated as entities. Cheap to clone.
///
/// Everything refers to players by eid and resolves them through the
/// manager's registry at the last moment, so a player who disconnects
/// mid-flight just fails the lookup instead of dangling.
#[derive(Clone)]
pub enum Entity {
  Entity(Arc<EntityData>),
  Player(i32),
}

impl Entity {
  pub fn as_entity(&self) -> Option<&Arc<EntityData>> {
    match self {
      Self::Entity(e) => Some(e),
      Self::Player(_) => None,
    }
  }

  pub fn as_player(&self, world: &World) -> Option<Arc<Player>> {
    match self {
      Self::Entity(_) => None,
      Self::Player(eid) => world.wm().get_player(*eid),
    }
  }

  pub fn kind(&self) -> Kind {
    match self {
      Self::Entity(e) => e.kind(),
      Self::Player(_) => Kind::Player,
    }
  }

  /// Runs one tick. Returns true if the entity has reached its terminal
  /// state and should be dropped from the scheduler.
  pub(crate) fn tick(&self, world: &Arc<World>) -> bool {
    match self {
      Self::Entity(e) => e.tick(world),
      Self::Player(eid) => match world.wm().get_player(*eid) {
        Some(p) => p.tick(),
        // The player is gone; their updates go with them.
        None => true,
      },
    }
  }
}

/// The data for a server-controlled entity. Players have their own type;
/// this is everything else.
pub struct EntityData {
  eid:      i32,
  kind:     Kind,
  pos:      Mutex<EntityPos>,
  behavior: Mutex<Box<dyn Behavior + Send>>,
}

impl EntityData {
  pub fn new(eid: i32, kind: Kind, pos: FPos) -> Self {
    EntityData {
      eid,
      kind,
      pos: Mutex::new(EntityPos::new(pos)),
      behavior: Mutex::new(behavior::for_kind(kind)),
    }
  }

  /// Creates an entity with the given behavior, instead of the default for
  /// its kind.
  pub fn new_custom<B: Behavior + Send + 'static>(
    eid: i32,
    kind: Kind,
    pos: FPos,
    behavior: B,
  ) -> Self {
    EntityData { eid, kind, pos: Mutex::new(EntityPos::new(pos)), behavior: Mutex::new(Box::new(behavior)) }
  }

  pub fn eid(&self) -> i32 { self.eid }
  pub fn kind(&self) -> Kind { self.kind }
  pub fn fpos(&self) -> FPos { self.pos.lock().pos }

  pub fn metadata(&self) -> Metadata { Metadata::new() }

  fn tick(&self, world: &Arc<World>) -> bool {
    let mut p = *self.pos.lock();
    let old = p.pos;
    if self.behavior.lock().tick(self, &mut p).0 {
      return true;
    }
    *self.pos.lock() = p;
    if p.pos != old {
      if p.pos.chunk() != old.chunk() {
        if let Some(c) = world.get_chunk(old.chunk()) {
          c.remove_entity(self.eid);
        }
        world.load_chunk(p.pos.chunk()).add_entity(self.eid);
      }
      for pl in world.players().iter().in_view(old.chunk()) {
        pl.send(cb::Packet::EntityTeleport {
          eid:   self.eid,
          x:     p.pos.fixed_x(),
          y:     p.pos.fixed_y(),
          z:     p.pos.fixed_z(),
          yaw:   p.yaw,
          pitch: p.pitch,
        });
      }
    }
    false
  }
}
