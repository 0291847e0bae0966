//! Serverbound packet dispatch. The connection reactor decodes bytes into
//! [`sb::Packet`]s and hands them here; handlers run on a shared thread
//! pool so a slow handler never stalls the reactor.

use super::{cb, sb};
use crate::{block::Block, player::Player, world::WorldManager};
use ba_common::{
  math::{FPos, Pos},
  util::ThreadPool,
};
use std::sync::Arc;

pub struct Handler {
  pool: ThreadPool<Arc<WorldManager>>,
}

impl Handler {
  pub fn new(wm: &Arc<WorldManager>) -> Self {
    let wm = wm.clone();
    Handler { pool: ThreadPool::auto("packet handler", move || wm.clone()) }
  }

  /// Queues the given packet to be handled on the pool.
  pub fn dispatch(&self, pl: Arc<Player>, p: sb::Packet) {
    self.pool.execute(move |wm| handle(wm, &pl, p));
  }
}

/// Handles one packet from a logged-in player. Login itself goes through
/// [`WorldManager::new_player`]; a repeat login here is a protocol
/// violation.
pub fn handle(wm: &Arc<WorldManager>, pl: &Arc<Player>, p: sb::Packet) {
  match p {
    sb::Packet::Login { .. } => {
      warn!("{} sent a login packet after logging in", pl.username());
      pl.kick("invalid login");
    }
    sb::Packet::KeepAlive { id } => pl.handle_pong(id),
    sb::Packet::Position { x, y, z, on_ground } => {
      let (_, yaw, pitch) = pl.pos_look();
      pl.move_to(FPos::new(x, y, z), yaw, pitch, on_ground);
    }
    sb::Packet::PositionLook { x, y, z, yaw, pitch, on_ground } => {
      pl.move_to(FPos::new(x, y, z), yaw, pitch, on_ground);
    }
    sb::Packet::Look { yaw, pitch, on_ground } => {
      let (pos, _, _) = pl.pos_look();
      pl.move_to(pos, yaw, pitch, on_ground);
    }
    sb::Packet::OnGround { on_ground } => {
      let (pos, yaw, pitch) = pl.pos_look();
      pl.move_to(pos, yaw, pitch, on_ground);
    }
    sb::Packet::BlockDig { pos, status } => handle_dig(pl, pos, status),
    // Arm swings and sneak/sprint toggles don't change any server state we
    // track yet.
    sb::Packet::Animation => {}
    sb::Packet::EntityAction { .. } => {}
    sb::Packet::ListPing => {
      let motd: String = wm.config().get("motd");
      let max: u32 = wm.config().get("max-players");
      pl.kick(format!("{motd}\u{a7}{}\u{a7}{max}", wm.player_count()));
    }
    sb::Packet::Disconnect => wm.remove_player(pl.eid()),
  }
}

fn handle_dig(pl: &Arc<Player>, pos: Pos, status: sb::DigStatus) {
  let world = pl.world();
  if !world.xz_in_bounds(pos) {
    // The client tried to dig outside a bounded world. The map would ignore
    // the write anyway, but the client already predicted the break, so set
    // it straight.
    let block = world.get_block(pos).unwrap_or(Block::AIR);
    pl.send(cb::Packet::BlockChange { pos, block });
    return;
  }
  if status == sb::DigStatus::Finish {
    world.queue_update(pos, Block::AIR);
  }
}
