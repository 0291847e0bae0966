//! Clientbound packets.

use crate::{block::Block, entity};
use ba_common::math::{ChunkPos, FPos, Pos};

/// Everything the core can tell a client. The external codec turns these
/// into whatever bytes the protocol version wants.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
  Login {
    eid:         i32,
    server_name: String,
    max_players: u32,
  },
  SpawnPos {
    pos: Pos,
  },
  /// Absolute position echo. Sent on join, teleport, and whenever the
  /// server rejects or clamps a client move.
  SetPosLook {
    pos:       FPos,
    yaw:       f32,
    pitch:     f32,
    on_ground: bool,
  },
  BlockChange {
    pos:   Pos,
    block: Block,
  },
  /// A full chunk payload. Sections are packed block cells; `None` sections
  /// are all air.
  Chunk {
    pos:      ChunkPos,
    sections: Vec<Option<Vec<u16>>>,
  },
  /// Tells the client to forget a chunk.
  UnloadChunk {
    pos: ChunkPos,
  },
  SpawnPlayer {
    eid:      i32,
    username: String,
    pos:      FPos,
    yaw:      f32,
    pitch:    f32,
    meta:     entity::Metadata,
  },
  SpawnEntity {
    eid:  i32,
    kind: entity::Kind,
    pos:  FPos,
  },
  RemoveEntity {
    eid: i32,
  },
  /// Absolute entity move, in 1/32 block fixed point.
  EntityTeleport {
    eid:   i32,
    x:     i32,
    y:     i32,
    z:     i32,
    yaw:   f32,
    pitch: f32,
  },
  EntityLook {
    eid:   i32,
    yaw:   f32,
    pitch: f32,
  },
  EntityHeadLook {
    eid: i32,
    yaw: f32,
  },
  Chat {
    msg: String,
  },
  KeepAlive {
    id: u16,
  },
  Kick {
    reason: String,
  },
}
