use super::Player;
use crate::{
  entity::Entity,
  net::cb,
  world::{GenFlags, World},
};
use ba_common::math::{ChunkPos, FPos};
use std::sync::Arc;

impl Player {
  /// Loads new close chunks to the player and unloads those that are too
  /// far away. Runs whenever the player crosses a chunk boundary, and on
  /// world join.
  ///
  /// Unloads always go out before loads, and loads are sent nearest chunk
  /// first. Any player found in a chunk entering or leaving the window is
  /// spawned or despawned in both directions.
  pub(crate) fn stream_chunks(self: &Arc<Self>) {
    let world = self.world();
    let wm = world.wm().clone();
    let mut stream = self.stream.lock();
    let center = self.pos().chunk();
    let half = (self.view_distance / 2) as i32;

    let mut prev = stream.known.clone();
    let mut to_load = vec![];
    for cx in (center.x() - half)..=(center.x() + half) {
      for cz in (center.z() - half)..=(center.z() + half) {
        let cpos = ChunkPos::new(cx, cz);
        if !stream.known.contains(&cpos) {
          to_load.push(cpos);
        }
        prev.remove(&cpos);
      }
    }
    // Nearest chunks stream first.
    to_load.sort_by(|a, b| a.dist(center).partial_cmp(&b.dist(center)).unwrap());

    for cpos in prev {
      stream.known.remove(&cpos);
      self.send(cb::Packet::UnloadChunk { pos: cpos });

      // Anyone in that chunk is out of sight now, both ways.
      let ch = world.load_chunk(cpos);
      for eid in ch.entities() {
        if eid == self.eid {
          continue;
        }
        match world.entity(eid) {
          Some(Entity::Player(_)) => {
            if let Some(p) = wm.get_player(eid) {
              self.despawn_from(&p);
              p.despawn_from(self);
            }
          }
          Some(Entity::Entity(_)) => self.send(cb::Packet::RemoveEntity { eid }),
          None => {}
        }
      }
    }

    for cpos in to_load {
      stream.known.insert(cpos);
      let ch = world.load_chunk(cpos);
      self.send(cb::Packet::Chunk { pos: cpos, sections: ch.serialize_sections() });

      for eid in ch.entities() {
        if eid == self.eid {
          continue;
        }
        match world.entity(eid) {
          Some(Entity::Player(_)) => {
            if let Some(p) = wm.get_player(eid) {
              self.spawn_to(&p);
              p.spawn_to(self);
            }
          }
          Some(Entity::Entity(e)) => {
            self.send(cb::Packet::SpawnEntity { eid, kind: e.kind(), pos: e.fpos() })
          }
          None => {}
        }
      }
    }

    // Hand our roster entry over to the new chunk.
    if let Some(prev_chunk) = world.get_chunk(stream.curr_chunk) {
      prev_chunk.remove_entity(self.eid);
    }
    world.load_chunk(center).add_entity(self.eid);
    stream.curr_chunk = center;
  }

  /// Moves the player to the given position, clamping it into a bounded
  /// world. This re-streams chunks on a boundary cross, and broadcasts the
  /// movement to everyone who can see this player.
  pub fn move_to(self: &Arc<Self>, dest: FPos, yaw: f32, pitch: f32, on_ground: bool) {
    let world = self.world();
    let mut dest = dest;
    let width = world.width();
    let depth = world.depth();
    let mut clamped = false;
    if width > 0 {
      if dest.x < 0.0 {
        dest.x = 1.0;
        clamped = true;
      } else if dest.x >= f64::from(width) {
        dest.x = f64::from(width - 1);
        clamped = true;
      }
    }
    if depth > 0 {
      if dest.z < 0.0 {
        dest.z = 1.0;
        clamped = true;
      } else if dest.z >= f64::from(depth) {
        dest.z = f64::from(depth - 1);
        clamped = true;
      }
    }
    if clamped {
      // The client has already moved itself out of bounds; set it straight.
      self.send(cb::Packet::SetPosLook { pos: dest, yaw, pitch, on_ground });
    }

    let prev = {
      let mut pos = self.pos.lock();
      let prev = *pos;
      pos.curr = dest;
      pos.yaw = yaw;
      pos.pitch = pitch;
      pos.on_ground = on_ground;
      prev
    };

    if prev.curr.chunk() != dest.chunk() {
      self.stream_chunks();
      self.precache_ahead(prev.curr.chunk(), dest.chunk());
    }

    let pos_changed = prev.curr != dest;
    let look_changed = prev.yaw != yaw || prev.pitch != pitch;
    if !pos_changed && !look_changed {
      return;
    }

    let wm = world.wm().clone();
    for eid in self.visible_players() {
      let p = match wm.get_player(eid) {
        Some(p) => p,
        None => continue,
      };
      if pos_changed {
        // Always an absolute teleport. Relative moves save bytes, but lose
        // precision the moment one packet is dropped.
        p.send(cb::Packet::EntityTeleport {
          eid: self.eid,
          x: dest.fixed_x(),
          y: dest.fixed_y(),
          z: dest.fixed_z(),
          yaw,
          pitch,
        });
        p.send(cb::Packet::EntityHeadLook { eid: self.eid, yaw });
      } else {
        p.send(cb::Packet::EntityLook { eid: self.eid, yaw, pitch });
        p.send(cb::Packet::EntityHeadLook { eid: self.eid, yaw });
      }
    }
  }

  /// Hands the ring of chunks just past the window, in the direction of
  /// travel, to the generator pipeline. By the time the player walks there
  /// the chunks are already in the map, so the streaming pass stays cheap.
  fn precache_ahead(self: &Arc<Self>, old: ChunkPos, new: ChunkPos) {
    let world = self.world();
    let gen = world.wm().generator();
    let half = (self.view_distance / 2) as i32;
    let flags = GenFlags::NODELIVER | GenFlags::NOABORT;
    let dx = (new.x() - old.x()).signum();
    if dx != 0 {
      let x = new.x() + dx * (half + 1);
      for z in (new.z() - half)..=(new.z() + half) {
        gen.request(&world, ChunkPos::new(x, z), self, flags, 0);
      }
    }
    let dz = (new.z() - old.z()).signum();
    if dz != 0 {
      let z = new.z() + dz * (half + 1);
      for x in (new.x() - half)..=(new.x() + half) {
        gen.request(&world, ChunkPos::new(x, z), self, flags, 0);
      }
    }
  }

  /// Teleports the player, echoing the final position back to their
  /// client.
  pub fn teleport(self: &Arc<Self>, dest: FPos, yaw: f32, pitch: f32) {
    self.move_to(dest, yaw, pitch, false);
    // Re-read, since move_to may have clamped.
    let pos = self.pos();
    self.send(cb::Packet::SetPosLook { pos, yaw, pitch, on_ground: false });
  }

  /// Sends the player to the given world. The old world's chunks are
  /// unloaded and everyone there stops seeing us.
  pub fn join_world(self: &Arc<Self>, w: &Arc<World>) {
    let old = self.world();
    if old.wid() == w.wid() {
      return;
    }
    let wm = old.wm().clone();

    old.drop_player(self);
    // Despawn in both directions before we leave.
    let peers = self.visible_players();
    for eid in peers {
      if let Some(p) = wm.get_player(eid) {
        self.despawn_from(&p);
        p.despawn_from(self);
      }
    }

    {
      let mut stream = self.stream.lock();
      let known: Vec<ChunkPos> = stream.known.drain().collect();
      for cpos in known {
        self.send(cb::Packet::UnloadChunk { pos: cpos });
      }
      stream.curr_chunk = w.spawn_pos().chunk();
    }

    *self.world.write() = w.clone();
    {
      let mut pos = self.pos.lock();
      pos.curr = w.spawn_pos();
    }
    w.player_join(self);
  }
}
