use super::{Chunk, World};
use crate::{entity::Entity, net::cb, player::Player};
use ba_common::math::ChunkPos;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::Arc;

impl World {
  /// Pregenerates the spawn region, so the first player to join doesn't pay
  /// for it. Generation runs across all cores; the store at the end never
  /// overwrites a chunk that appeared in the meantime.
  pub(super) fn init(self: &Arc<Self>) {
    let r = self.wm().config().get::<u32>("world.pregen-radius") as i32;
    info!("generating spawn terrain...");
    let chunks = Mutex::new(vec![]);
    (-r..=r).into_par_iter().for_each(|x| {
      for z in -r..=r {
        let pos = ChunkPos::new(x, z);
        if self.has_loaded_chunk(pos) {
          continue;
        }
        let c = Chunk::new(pos);
        if self.chunk_in_bounds(pos) {
          self.gen.generate(self, &c);
        } else {
          self.gen.generate_edge(self, &c);
        }
        chunks.lock().push(c);
      }
    });
    for c in chunks.into_inner() {
      self.put_chunk(c);
    }
    info!("done generating spawn terrain");
  }

  /// Spawns a player into this world: registers them, streams the initial
  /// chunk window, and schedules their keepalive ticks. Runs both on login
  /// and on world switch; the login packet itself is sent once, by
  /// [`WorldManager::new_player`](super::WorldManager::new_player).
  pub(crate) fn player_join(self: &Arc<Self>, player: &Arc<Player>) {
    self.players.write().insert(player.eid(), player.clone());
    self.entities.write().insert(player.eid(), Entity::Player(player.eid()));
    info!("{} joined world {}", player.username(), self.wid());

    let spawn = self.spawn_pos();
    player.send(cb::Packet::SpawnPos { pos: spawn.block() });
    player.stream_chunks();
    player.send(cb::Packet::SetPosLook { pos: spawn, yaw: 0.0, pitch: 0.0, on_ground: true });

    // This persistent update is what drives the player's keepalive cycle.
    // On a world switch the old world's copy goes stale and gets dropped.
    self.physics().queue_entity(self, player.eid(), true, 20, None);
  }

  /// Removes a player from this world's tables and chunk roster. Used on
  /// disconnect and on world switch.
  pub(crate) fn drop_player(self: &Arc<Self>, player: &Arc<Player>) {
    self.players.write().remove(&player.eid());
    self.entities.write().remove(&player.eid());
    if let Some(c) = self.get_chunk(player.current_chunk()) {
      c.remove_entity(player.eid());
    }
  }

  /// Removes a player from this world entirely. Called after their
  /// connection is gone.
  pub(crate) fn player_leave(self: &Arc<Self>, player: &Arc<Player>) {
    self.drop_player(player);
    player.despawn_from_all();

    info!("{} left the game", player.username());
    self.broadcast(&format!("{} has left", player.username()));
  }
}
