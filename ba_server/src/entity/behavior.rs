use super::{EntityData, EntityPos, Kind};

/// A wrapper type, to make it clear that `true` means an entity should be
/// removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShouldDespawn(pub bool);

pub trait Behavior: Send {
  /// Called once per scheduled tick, with the entity's position state.
  /// Mutations to `p` are written back afterwards.
  fn tick(&mut self, ent: &EntityData, p: &mut EntityPos) -> ShouldDespawn {
    let _ = ent;
    let vel = p.vel;
    p.pos += ba_common::math::FPos::new(vel.x, vel.y, vel.z);
    if !p.on_ground {
      p.vel.y -= 0.08;
    }
    p.vel.y *= 0.98;
    p.vel.x *= 0.91;
    p.vel.z *= 0.91;
    ShouldDespawn(false)
  }
}

/// Default functionality for entities. Mostly used when an entity hasn't
/// been implemented.
#[derive(Default)]
struct DefaultBehavior;
impl Behavior for DefaultBehavior {}

/// Dropped items: fall like everything else, and age out after 5 minutes
/// (or after falling out of the world).
#[derive(Default)]
pub struct ItemBehavior {
  age: u32,
}

const ITEM_DESPAWN_AGE: u32 = 6000;

impl Behavior for ItemBehavior {
  fn tick(&mut self, ent: &EntityData, p: &mut EntityPos) -> ShouldDespawn {
    self.age += 1;
    if self.age >= ITEM_DESPAWN_AGE || p.pos.y < -64.0 {
      return ShouldDespawn(true);
    }
    DefaultBehavior.tick(ent, p)
  }
}

pub(super) fn for_kind(kind: Kind) -> Box<dyn Behavior + Send> {
  match kind {
    Kind::Item => Box::new(ItemBehavior::default()),
    _ => Box::new(DefaultBehavior),
  }
}
