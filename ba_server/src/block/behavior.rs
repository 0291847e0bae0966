use super::{Block, Kind};
use crate::world::World;
use ba_common::math::Pos;
use rand::{rngs::SmallRng, Rng};
use std::{collections::HashMap, sync::Arc};

/// A rule that runs when the physics scheduler fires an update at a block of
/// some kind. Implementations must not retain the rng; it belongs to the
/// worker thread.
pub trait Behavior: Send + Sync {
  fn tick(&self, world: &Arc<World>, pos: Pos, extra: i32, rnd: &mut SmallRng);
}

/// All block behaviors, keyed by kind. This is built once at startup and
/// never modified, so readers don't need a lock.
pub struct BehaviorStore {
  behaviors: HashMap<Kind, Box<dyn Behavior>>,
}

impl BehaviorStore {
  pub fn new() -> Self { BehaviorStore { behaviors: make_behaviors() } }

  pub fn get(&self, kind: Kind) -> Option<&dyn Behavior> {
    self.behaviors.get(&kind).map(|b| b.as_ref())
  }

  /// Returns true if blocks of this kind react to updates at all. Used for
  /// neighbor notification, so stable blocks don't get queued.
  pub fn has(&self, kind: Kind) -> bool { self.behaviors.contains_key(&kind) }
}

impl Default for BehaviorStore {
  fn default() -> Self { BehaviorStore::new() }
}

fn make_behaviors() -> HashMap<Kind, Box<dyn Behavior>> {
  let mut out: HashMap<_, Box<dyn Behavior>> = HashMap::new();
  macro_rules! behaviors {
    ( $($kind:ident => $impl:expr,)* ) => {
      $(
        out.insert(Kind::$kind, Box::new($impl));
      )*
    }
  }
  behaviors! {
    Sand => FallingBehavior,
    Gravel => FallingBehavior,
    Leaves => LeavesBehavior,
  };
  out
}

/// Sand and gravel fall straight down through air, one block per update.
struct FallingBehavior;

impl Behavior for FallingBehavior {
  fn tick(&self, world: &Arc<World>, pos: Pos, _extra: i32, _rnd: &mut SmallRng) {
    if pos.y() <= 0 {
      return;
    }
    let this = match world.get_block(pos) {
      Ok(b) => b,
      Err(_) => return,
    };
    let below = pos.with_y(pos.y() - 1);
    if world.get_block(below).map(|b| b.is_air()).unwrap_or(false) {
      world.queue_update(below, this);
      world.queue_update(pos, Block::AIR);
      // Whatever is above us may now be unsupported. queue_block_once keeps
      // a whole falling column from flooding the queue.
      world.physics().queue_block_once(world, pos.with_y(pos.y() + 1), 0, 2, None, None);
    }
  }
}

/// Leaves slowly rot away once they get poked by an update.
struct LeavesBehavior;

impl Behavior for LeavesBehavior {
  fn tick(&self, world: &Arc<World>, pos: Pos, _extra: i32, rnd: &mut SmallRng) {
    if rnd.gen_range(0..8) == 0 {
      world.queue_update(pos, Block::AIR);
    } else {
      world.physics().queue_block_once(world, pos, 0, 10, None, None);
    }
  }
}
