//! Handles all the worlds on a basalt server.
//!
//! [`World`] owns everything for a single world: the chunk map, the players
//! and entities inside it, and a handle to the shared physics scheduler.
//!
//! [`WorldManager`] is the global server type. There is one per server. It
//! owns the physics scheduler, the chunk generator pipeline, the block
//! behavior registry, and the table of every online player.

mod chunk;
pub mod gen;
mod generator;
mod init;
mod players;

#[cfg(test)]
mod tests;

pub use chunk::Chunk;
pub use generator::{ChunkGenerator, GenFlags};
pub use players::{PlayersIter, PlayersMap};

use crate::{
  block::{BehaviorStore, Block},
  entity,
  entity::Entity,
  net::{cb, sb, ConnSender},
  physics::Physics,
  player::Player,
};
use ba_common::{
  config::Config,
  math::{ChunkPos, FPos, Pos, PosError},
};
use parking_lot::{RwLock, RwLockReadGuard};
use rand::rngs::SmallRng;
use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
  },
};

pub struct World {
  wid:      u32,
  chunks:   RwLock<HashMap<ChunkPos, Arc<Chunk>>>,
  gen:      Box<dyn gen::Generator + Send + Sync>,
  /// World size in blocks. 0 means unbounded on that axis.
  width:    u32,
  depth:    u32,
  spawn:    FPos,
  players:  RwLock<PlayersMap>,
  entities: RwLock<HashMap<i32, Entity>>,
  wm:       Arc<WorldManager>,
}

pub struct WorldManager {
  // This will always have at least 1 entry. The world at index 0 is
  // considered the "default" world.
  worlds:    RwLock<Vec<Arc<World>>>,
  // Every online player, keyed by eid. Worlds also keep their own maps.
  players:   RwLock<HashMap<i32, Arc<Player>>>,
  physics:   Arc<Physics>,
  generator: ChunkGenerator,
  behaviors: Arc<BehaviorStore>,
  eid:       AtomicI32,
  config:    Arc<Config>,
}

impl World {
  pub(crate) fn new(wm: Arc<WorldManager>, wid: u32) -> Arc<Self> {
    let config = wm.config().clone();
    let gen = gen::from_name(&config.get::<String>("world.generator"), config.get("world.seed"));
    Arc::new(World {
      wid,
      chunks: RwLock::new(HashMap::new()),
      gen,
      width: config.get("world.width"),
      depth: config.get("world.depth"),
      spawn: FPos::new(
        config.get("world.spawn-x"),
        config.get("world.spawn-y"),
        config.get("world.spawn-z"),
      ),
      players: RwLock::new(PlayersMap::new()),
      entities: RwLock::new(HashMap::new()),
      wm,
    })
  }

  /// A server-unique id for this world. The physics membership index is
  /// keyed on this.
  pub fn wid(&self) -> u32 { self.wid }
  pub fn width(&self) -> u32 { self.width }
  pub fn depth(&self) -> u32 { self.depth }
  pub fn spawn_pos(&self) -> FPos { self.spawn }

  pub fn wm(&self) -> &Arc<WorldManager> { &self.wm }
  pub fn physics(&self) -> &Arc<Physics> { self.wm.physics() }
  pub fn behaviors(&self) -> &Arc<BehaviorStore> { self.wm.behaviors() }

  /// Returns the chunk at the given position, if it is loaded.
  pub fn get_chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
    self.chunks.read().get(&pos).cloned()
  }

  pub fn has_loaded_chunk(&self, pos: ChunkPos) -> bool { self.chunks.read().contains_key(&pos) }

  /// Returns the chunk at the given position, synthesizing it through the
  /// terrain generator if needed. This blocks for the duration of
  /// generation.
  pub fn load_chunk(self: &Arc<Self>, pos: ChunkPos) -> Arc<Chunk> {
    if let Some(c) = self.get_chunk(pos) {
      return c;
    }
    // Generate outside the map lock. Two racing loaders may both generate;
    // the first insert wins and the loser's chunk is dropped, so nothing a
    // player saw ever gets replaced.
    let c = Arc::new(Chunk::new(pos));
    if self.chunk_in_bounds(pos) {
      self.gen.generate(self, &c);
    } else {
      self.gen.generate_edge(self, &c);
    }
    self.chunks.write().entry(pos).or_insert(c).clone()
  }

  /// Stores a chunk, unless one is already present at its position. Used
  /// after generating chunks on other threads.
  pub fn put_chunk(&self, chunk: Chunk) {
    let pos = chunk.pos();
    self.chunks.write().entry(pos).or_insert_with(|| Arc::new(chunk));
  }

  /// Returns true if the given block column is within a bounded world's
  /// horizontal bounds. Always true for unbounded worlds.
  pub fn xz_in_bounds(&self, pos: Pos) -> bool {
    (self.width == 0 || (0..self.width as i32).contains(&pos.x()))
      && (self.depth == 0 || (0..self.depth as i32).contains(&pos.z()))
  }

  fn chunk_in_bounds(&self, pos: ChunkPos) -> bool {
    (self.width == 0 || (pos.block_x() >= 0 && pos.block_x() < self.width as i32))
      && (self.depth == 0 || (pos.block_z() >= 0 && pos.block_z() < self.depth as i32))
  }

  /// Reads the block at the given position, loading the chunk if needed.
  pub fn get_block(self: &Arc<Self>, pos: Pos) -> Result<Block, PosError> {
    if !(0..256).contains(&pos.y()) {
      return Err(pos.err("outside of world".into()));
    }
    Ok(self.load_chunk(pos.chunk()).get_block(pos))
  }

  /// Writes the block at the given position and tells everyone in view.
  /// Writes outside a bounded world are silently dropped; the intake layer
  /// is expected to have echoed a correction to whoever asked.
  pub fn set_block(self: &Arc<Self>, pos: Pos, b: Block) -> Result<(), PosError> {
    if !(0..256).contains(&pos.y()) {
      return Err(pos.err("outside of world".into()));
    }
    if !self.xz_in_bounds(pos) {
      return Ok(());
    }
    self.load_chunk(pos.chunk()).set_block(pos, b);
    for p in self.players().iter().in_view(pos.chunk()) {
      p.send(cb::Packet::BlockChange { pos, block: b });
    }
    Ok(())
  }

  /// The mutation intake: records a pending block change, to be written
  /// through (and have neighbors notified) by the physics scheduler on the
  /// next tick.
  pub fn queue_update(self: &Arc<Self>, pos: Pos, b: Block) {
    if !(0..256).contains(&pos.y()) || !self.xz_in_bounds(pos) {
      return;
    }
    self.physics().queue_block(
      self,
      pos,
      i32::from(b.to_u16()),
      1,
      None,
      Some(Self::apply_queued_update),
    );
  }

  /// The write-through half of [`queue_update`](Self::queue_update). Runs
  /// on a physics worker.
  fn apply_queued_update(world: &Arc<World>, pos: Pos, extra: i32, _rnd: &mut SmallRng) {
    let b = Block::from_u16(extra as u16);
    let _ = world.set_block(pos, b);
    // The block that just went in may have rules of its own (sand starts
    // falling the moment it is placed).
    if world.behaviors().has(b.kind()) {
      world.physics().queue_block_once(world, pos, 0, 2, None, None);
    }
    // The write may also have left a neighbor unsupported (or otherwise
    // interested). queue_block_once collapses a cascade of these into one
    // pending update per cell.
    for n in pos.neighbors() {
      let kind = match world.get_block(n) {
        Ok(b) => b.kind(),
        Err(_) => continue,
      };
      if world.behaviors().has(kind) {
        world.physics().queue_block_once(world, n, 0, 2, None, None);
      }
    }
  }

  /// Builds the chunk payload packet for the given chunk, loading it if
  /// needed.
  pub fn serialize_chunk(self: &Arc<Self>, pos: ChunkPos) -> cb::Packet {
    cb::Packet::Chunk { pos, sections: self.load_chunk(pos).serialize_sections() }
  }

  /// Returns a read lock on the players map.
  pub fn players(&self) -> RwLockReadGuard<'_, PlayersMap> { self.players.read() }

  /// Returns the entity with the given eid, if it is in this world.
  pub fn entity(&self, eid: i32) -> Option<Entity> { self.entities.read().get(&eid).cloned() }

  pub(crate) fn add_entity(&self, eid: i32, ent: Entity) {
    self.entities.write().insert(eid, ent);
  }

  pub(crate) fn remove_entity(&self, eid: i32) { self.entities.write().remove(&eid); }

  /// Summons a new entity, announces it to everyone in view, and schedules
  /// its ticks.
  pub fn summon(self: &Arc<Self>, kind: entity::Kind, pos: FPos) -> i32 {
    let eid = self.wm.new_eid();
    let data = Arc::new(entity::EntityData::new(eid, kind, pos));
    self.add_entity(eid, Entity::Entity(data));
    self.load_chunk(pos.chunk()).add_entity(eid);
    for p in self.players().iter().in_view(pos.chunk()) {
      p.send(cb::Packet::SpawnEntity { eid, kind, pos });
    }
    self.physics().queue_entity(self, eid, true, 1, None);
    eid
  }

  /// Removes an entity: drops it from the registry and its chunk roster,
  /// and tells every client in view to destroy it.
  pub fn despawn(self: &Arc<Self>, eid: i32) {
    let ent = match self.entities.write().remove(&eid) {
      Some(e) => e,
      None => return,
    };
    if let Entity::Entity(data) = &ent {
      let chunk = data.fpos().chunk();
      if let Some(c) = self.get_chunk(chunk) {
        c.remove_entity(eid);
      }
      for p in self.players().iter().in_view(chunk) {
        p.send(cb::Packet::RemoveEntity { eid });
      }
    }
  }

  /// Broadcasts a chat message to everybody in the world.
  pub fn broadcast(&self, msg: &str) {
    for p in self.players.read().values() {
      p.send(cb::Packet::Chat { msg: msg.into() });
    }
  }
}

impl WorldManager {
  pub fn new(config: Config) -> Arc<Self> {
    let physics = Physics::new(config.get::<u32>("physics.updates-per-tick") as usize);
    let generator = ChunkGenerator::new(
      config.get("generator.idle-rest-ms"),
      config.get("generator.deep-rest-ms"),
    );
    Arc::new(WorldManager {
      worlds: RwLock::new(vec![]),
      players: RwLock::new(HashMap::new()),
      physics,
      generator,
      behaviors: Arc::new(BehaviorStore::new()),
      // All players think they are EID 1, so we start at 2. EID 0 is
      // invalid.
      eid: 2.into(),
      config: Arc::new(config),
    })
  }

  /// Brings the background machinery up: the physics worker pool and the
  /// chunk generator thread. Failure here is fatal to server startup.
  pub fn run(self: &Arc<Self>) -> Result<(), crate::physics::InitError> {
    self.physics.set_worker_count(self.config.get::<u32>("physics.workers") as usize)?;
    self.generator.start()?;
    Ok(())
  }

  /// Returns the config used in the whole server.
  pub fn config(&self) -> &Arc<Config> { &self.config }
  pub fn physics(&self) -> &Arc<Physics> { &self.physics }
  pub fn generator(&self) -> &ChunkGenerator { &self.generator }
  pub fn behaviors(&self) -> &Arc<BehaviorStore> { &self.behaviors }

  /// Returns a new, unique EID.
  pub fn new_eid(&self) -> i32 { self.eid.fetch_add(1, Ordering::SeqCst) }

  /// Adds a new world and pregenerates its spawn region.
  pub fn add_world(self: &Arc<Self>) -> Arc<World> {
    let mut worlds = self.worlds.write();
    let world = World::new(self.clone(), worlds.len() as u32);
    world.init();
    worlds.push(world.clone());
    world
  }

  /// Returns the default world. This can be used to easily get a world
  /// without any other context.
  pub fn default_world(&self) -> Arc<World> { self.worlds.read()[0].clone() }

  pub fn get_player(&self, eid: i32) -> Option<Arc<Player>> {
    self.players.read().get(&eid).cloned()
  }

  pub fn player_count(&self) -> u32 { self.players.read().len() as u32 }

  /// Handles a login packet from a fresh connection. On success the player
  /// is spawned into the default world; on a protocol mismatch the
  /// connection is kicked and `None` is returned.
  pub fn handle_login(self: &Arc<Self>, conn: ConnSender, p: sb::Packet) -> Option<Arc<Player>> {
    match p {
      sb::Packet::Login { protocol, username } => {
        let expected: u32 = self.config.get("protocol-version");
        if protocol != expected {
          let reason = if protocol < expected { "outdated client" } else { "outdated server" };
          warn!("{username} tried to log in with protocol {protocol} (expected {expected})");
          conn.send(cb::Packet::Kick { reason: reason.into() });
          return None;
        }
        Some(self.new_player(conn, username))
      }
      _ => {
        conn.send(cb::Packet::Kick { reason: "expected login".into() });
        None
      }
    }
  }

  /// Adds a new player into the game, in the default world at its spawn
  /// point.
  pub fn new_player(self: &Arc<Self>, conn: ConnSender, username: String) -> Arc<Player> {
    let w = self.default_world();
    let player = Player::new(self.new_eid(), username, conn, w.clone(), w.spawn_pos());
    self.players.write().insert(player.eid(), player.clone());
    player.send(cb::Packet::Login {
      eid:         player.eid(),
      server_name: self.config.get("server-name"),
      max_players: self.config.get("max-players"),
    });
    w.player_join(&player);
    w.broadcast(&format!("{} has joined", player.username()));
    player
  }

  /// Removes the player. This does not terminate their connection; it is
  /// called after the connection is already gone. If the player is not
  /// present, this does nothing.
  pub fn remove_player(self: &Arc<Self>, eid: i32) {
    let player = match self.players.write().remove(&eid) {
      Some(p) => p,
      None => return,
    };
    player.mark_removed();
    player.world().player_leave(&player);
  }

  /// A manager with a small, flat, cheap-to-generate test config.
  #[cfg(test)]
  pub(crate) fn new_test() -> Arc<Self> {
    WorldManager::new_test_with("[world]\ngenerator = \"flat\"\npregen-radius = 1\n")
  }

  #[cfg(test)]
  pub(crate) fn new_test_with(primary: &str) -> Arc<Self> {
    WorldManager::new(Config::from_src(primary, include_str!("../default.toml")))
  }
}
