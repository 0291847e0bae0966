use crate::{
  entity::Metadata,
  net::{cb, ConnSender},
  world::{Chunk, GenFlags, World},
};
use ba_common::math::{ChunkPos, FPos};
use parking_lot::{Mutex, RwLock};
use std::{
  collections::HashSet,
  fmt,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

mod stream;


#[derive(Debug, Clone, Copy)]
pub(crate) struct PlayerPosition {
  pub curr:      FPos,
  pub yaw:       f32,
  pub pitch:     f32,
  pub on_ground: bool,
}

/// The chunk streaming state machine. Everything here is guarded by one
/// mutex, so a player's streaming never interleaves with itself.
struct StreamState {
  /// Chunks this client has been told to load and not yet told to unload.
  known:      HashSet<ChunkPos>,
  curr_chunk: ChunkPos,
}

struct PingState {
  waiting: bool,
  id:      u16,
  last:    Instant,
  rtt:     Duration,
}

pub struct Player {
  // The EID of the player. Never changes.
  eid:      i32,
  username: String,
  conn:     ConnSender,
  world:    RwLock<Arc<World>>,

  /// Side length, in chunks, of the streamed window.
  view_distance: u32,
  keepalive:     Duration,

  pos:     Mutex<PlayerPosition>,
  stream:  Mutex<StreamState>,
  /// Eids of the player entities currently spawned on this client. Peers
  /// are resolved back through the manager's registry, never held directly.
  visible: Mutex<HashSet<i32>>,
  ping:    Mutex<PingState>,

  removed: AtomicBool,
}

impl fmt::Debug for Player {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Player").field("eid", &self.eid).field("username", &self.username).finish()
  }
}

impl Player {
  pub fn new(
    eid: i32,
    username: String,
    conn: ConnSender,
    world: Arc<World>,
    pos: FPos,
  ) -> Arc<Self> {
    let config = world.wm().config();
    let view_distance = config.get("streaming.radius");
    let keepalive = Duration::from_millis(config.get::<u64>("keepalive.interval-ms"));
    Arc::new(Player {
      eid,
      username,
      conn,
      view_distance,
      keepalive,
      pos: Mutex::new(PlayerPosition { curr: pos, yaw: 0.0, pitch: 0.0, on_ground: true }),
      stream: Mutex::new(StreamState { known: HashSet::new(), curr_chunk: pos.chunk() }),
      visible: Mutex::new(HashSet::new()),
      ping: Mutex::new(PingState {
        waiting: false,
        id:      0,
        last:    Instant::now(),
        rtt:     Duration::ZERO,
      }),
      world: RwLock::new(world),
      removed: AtomicBool::new(false),
    })
  }

  /// Returns the player's entity id. Used to send packets about entities.
  pub fn eid(&self) -> i32 { self.eid }
  /// Returns the player's username.
  pub fn username(&self) -> &String { &self.username }
  /// Returns the world the player is currently in.
  pub fn world(&self) -> Arc<World> { self.world.read().clone() }
  /// Returns the player's view distance: the side length, in chunks, of the
  /// square window streamed around them.
  pub fn view_distance(&self) -> u32 { self.view_distance }

  /// Queues a packet for this client.
  pub fn send(&self, p: cb::Packet) { self.conn.send(p); }

  /// Returns the player's position.
  pub fn pos(&self) -> FPos { self.pos.lock().curr }

  /// Returns the player's position and looking direction.
  pub fn pos_look(&self) -> (FPos, f32, f32) {
    let pos = self.pos.lock();
    (pos.curr, pos.yaw, pos.pitch)
  }

  /// The chunk this player was last streamed around.
  pub fn current_chunk(&self) -> ChunkPos { self.stream.lock().curr_chunk }

  /// Returns true if the given chunk is within this player's streaming
  /// window.
  pub fn can_see_chunk(&self, pos: ChunkPos) -> bool {
    let center = self.current_chunk();
    let half = (self.view_distance / 2) as i32;
    (pos.x() - center.x()).abs() <= half && (pos.z() - center.z()).abs() <= half
  }

  /// Snapshot of the chunks this client currently knows about.
  pub fn known_chunks(&self) -> HashSet<ChunkPos> { self.stream.lock().known.clone() }

  /// Snapshot of the peers spawned on this client.
  pub fn visible_players(&self) -> Vec<i32> { self.visible.lock().iter().copied().collect() }

  pub fn metadata(&self) -> Metadata {
    let mut meta = Metadata::new();
    meta.set(0, 0); // status byte: not on fire, not crouching
    meta
  }

  /// Spawns self on the given player's client. Idempotent: if self is
  /// already on that client, nothing is sent.
  pub fn spawn_to(self: &Arc<Self>, pl: &Arc<Player>) {
    if pl.eid() == self.eid {
      return;
    }
    if !pl.visible.lock().insert(self.eid) {
      return;
    }
    let (pos, yaw, pitch) = self.pos_look();
    pl.send(cb::Packet::SpawnPlayer {
      eid: self.eid,
      username: self.username.clone(),
      pos,
      yaw,
      pitch,
      meta: self.metadata(),
    });
    pl.send(cb::Packet::EntityHeadLook { eid: self.eid, yaw });
  }

  /// Despawns self from the given player's client. Idempotent.
  pub fn despawn_from(&self, pl: &Arc<Player>) {
    if pl.eid() == self.eid {
      return;
    }
    if pl.visible.lock().remove(&self.eid) {
      pl.send(cb::Packet::RemoveEntity { eid: self.eid });
    }
  }

  /// Despawns self from every client that can currently see us. Used on
  /// disconnect.
  pub(crate) fn despawn_from_all(&self) {
    let wm = self.world().wm().clone();
    let peers: Vec<i32> = self.visible.lock().drain().collect();
    for eid in peers {
      if let Some(p) = wm.get_player(eid) {
        self.despawn_from(&p);
      }
    }
  }

  /// Called by the chunk generator pipeline when a requested chunk is ready
  /// (or when the request was aborted). `extra` is the token that was
  /// passed to the request.
  pub fn deliver_chunk(
    self: &Arc<Self>,
    world: &Arc<World>,
    pos: ChunkPos,
    chunk: Option<Arc<Chunk>>,
    flags: GenFlags,
    extra: i32,
  ) {
    if flags.contains(GenFlags::ABORTED) {
      debug!("chunk {pos} for {} aborted (token {extra})", self.username);
      return;
    }
    let chunk = match chunk {
      Some(c) => c,
      None => return,
    };
    let mut stream = self.stream.lock();
    // The request may have raced a world switch or further movement; a
    // chunk we no longer care about is dropped here instead of leaking into
    // the client.
    if self.world().wid() != world.wid() {
      return;
    }
    let half = (self.view_distance / 2) as i32;
    if (pos.x() - stream.curr_chunk.x()).abs() > half
      || (pos.z() - stream.curr_chunk.z()).abs() > half
    {
      return;
    }
    if stream.known.insert(pos) {
      self.send(cb::Packet::Chunk { pos, sections: chunk.serialize_sections() });
      let wm = world.wm().clone();
      for eid in chunk.entities() {
        if eid == self.eid {
          continue;
        }
        if let Some(p) = wm.get_player(eid) {
          self.spawn_to(&p);
          p.spawn_to(self);
        }
      }
    }
  }

  /// Sends a ping and records its id. The id is derived from wall clock
  /// seconds, which is enough to catch a client answering some stale ping.
  pub fn ping(&self) {
    let id = {
      let mut ping = self.ping.lock();
      ping.waiting = true;
      ping.last = Instant::now();
      ping.id =
        (SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() & 0xFFFF)
          as u16;
      ping.id
    };
    self.send(cb::Packet::KeepAlive { id });
  }

  /// Pings the player if the keepalive cadence has elapsed. If the previous
  /// ping is still unanswered by then, the session is terminated instead.
  pub fn try_ping(self: &Arc<Self>) {
    let timed_out = {
      let ping = self.ping.lock();
      if ping.last + self.keepalive > Instant::now() {
        return;
      }
      ping.waiting
    };
    if timed_out {
      self.kick("ping timeout");
    } else {
      self.ping();
    }
  }

  /// Handles a keepalive answer. Id 0 is an unsolicited keepalive some
  /// clients send; any other mismatched id kills the session.
  pub fn handle_pong(self: &Arc<Self>, id: u16) {
    let ok = {
      let mut ping = self.ping.lock();
      if !ping.waiting {
        return;
      }
      if id == 0 || id == ping.id {
        ping.rtt = ping.last.elapsed();
        ping.waiting = false;
        true
      } else {
        false
      }
    };
    if !ok {
      self.kick("ping timeout");
    }
  }

  /// The most recent round trip time, as measured by keepalives.
  pub fn ping_time(&self) -> Duration { self.ping.lock().rtt }

  /// Kicks the player with the given reason.
  pub fn kick(self: &Arc<Self>, reason: impl Into<String>) {
    let reason = reason.into();
    self.send(cb::Packet::Kick { reason: reason.clone() });
    info!("{} has been kicked: {reason}", self.username);
    self.remove();
  }

  /// Removes the player from the server. Called on kick, and when the
  /// connection drops.
  pub(crate) fn remove(self: &Arc<Self>) {
    if !self.removed.swap(true, Ordering::SeqCst) {
      self.world().wm().clone().remove_player(self.eid);
    }
  }

  /// Flags the player as gone without going through the removal path
  /// again. Their scheduled updates drain out on their own.
  pub(crate) fn mark_removed(&self) { self.removed.store(true, Ordering::SeqCst); }

  /// One scheduled tick for this player. Returns true once the player is
  /// gone and their update should be dropped.
  pub(crate) fn tick(self: &Arc<Self>) -> bool {
    if self.removed.load(Ordering::SeqCst) {
      return true;
    }
    self.try_ping();
    false
  }
}
