use super::*;
use crate::block::Kind;
use std::{thread, time::Duration};

#[test]
fn load_chunk_generates_once() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  let pos = ChunkPos::new(5, 5);

  assert!(!w.has_loaded_chunk(pos));
  let a = w.load_chunk(pos);
  let b = w.load_chunk(pos);
  assert!(Arc::ptr_eq(&a, &b));
  // Flat terrain went in.
  assert_eq!(a.get_block(Pos::new(0, 63, 0)).kind(), Kind::Grass);
}

#[test]
fn put_chunk_never_overwrites() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  let pos = ChunkPos::new(9, 9);

  let loaded = w.load_chunk(pos);
  let other = Chunk::new(pos);
  w.put_chunk(other);
  assert!(Arc::ptr_eq(&loaded, &w.load_chunk(pos)));
}

#[test]
fn spawn_region_is_pregenerated() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  for x in -1..=1 {
    for z in -1..=1 {
      assert!(w.has_loaded_chunk(ChunkPos::new(x, z)));
    }
  }
}

#[test]
fn get_set_block() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  let pos = Pos::new(100, 64, -40);

  assert_eq!(w.get_block(pos).unwrap(), Block::AIR);
  w.set_block(pos, Block::from_kind(Kind::Cobblestone)).unwrap();
  assert_eq!(w.get_block(pos).unwrap().kind(), Kind::Cobblestone);

  assert!(w.get_block(pos.with_y(-1)).is_err());
  assert!(w.get_block(pos.with_y(256)).is_err());
}

#[test]
fn bounded_world_drops_out_of_bounds_writes() {
  let wm = WorldManager::new_test_with(
    "[world]\ngenerator = \"flat\"\npregen-radius = 0\nwidth = 16\ndepth = 16\n",
  );
  let w = wm.add_world();
  let out = Pos::new(20, 64, 5);

  // Writes fail silently at the intake, in both paths.
  w.set_block(out, Block::from_kind(Kind::Stone)).unwrap();
  assert_eq!(w.get_block(out).unwrap(), Block::AIR);

  w.queue_update(out, Block::from_kind(Kind::Stone));
  assert_eq!(wm.physics().pending(), 0);

  assert!(w.xz_in_bounds(Pos::new(15, 64, 15)));
  assert!(!w.xz_in_bounds(Pos::new(16, 64, 0)));
  assert!(!w.xz_in_bounds(Pos::new(0, 64, -1)));
}

#[test]
fn edge_chunks_outside_bounded_world() {
  let wm = WorldManager::new_test_with(
    "[world]\ngenerator = \"flat\"\npregen-radius = 0\nwidth = 16\ndepth = 16\n",
  );
  let w = wm.add_world();

  // Out past the edge there is only a bedrock floor.
  assert_eq!(w.get_block(Pos::new(-5, 0, 5)).unwrap().kind(), Kind::Bedrock);
  assert_eq!(w.get_block(Pos::new(-5, 63, 5)).unwrap(), Block::AIR);
}

#[test]
fn queue_update_writes_through_on_next_tick() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  let phys = wm.physics();
  let pos = Pos::new(4, 80, 4);

  w.queue_update(pos, Block::from_kind(Kind::Cobblestone));
  // Nothing is written until the scheduler runs.
  assert_eq!(w.get_block(pos).unwrap(), Block::AIR);
  assert_eq!(phys.count_at(&w, pos), 1);

  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(300));
  phys.set_worker_count(0).unwrap();

  assert_eq!(w.get_block(pos).unwrap().kind(), Kind::Cobblestone);
  assert_eq!(phys.count_at(&w, pos), 0);
}

#[test]
fn sand_falls_until_supported() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  let phys = wm.physics();

  // Flat ground is at y 63; sand dropped at y 70 should land on it.
  w.queue_update(Pos::new(8, 70, 8), Block::from_kind(Kind::Sand));
  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(2500));
  phys.set_worker_count(0).unwrap();

  assert_eq!(w.get_block(Pos::new(8, 64, 8)).unwrap().kind(), Kind::Sand);
  for y in 65..=70 {
    assert_eq!(w.get_block(Pos::new(8, y, 8)).unwrap(), Block::AIR, "block left at y {y}");
  }
}

#[test]
fn summon_and_despawn_entity() {
  let wm = WorldManager::new_test();
  let w = wm.add_world();

  let eid = w.summon(crate::entity::Kind::Item, FPos::new(8.5, 70.0, 8.5));
  assert!(w.entity(eid).is_some());
  assert!(w.load_chunk(ChunkPos::new(0, 0)).entities().contains(&eid));

  w.despawn(eid);
  assert!(w.entity(eid).is_none());
  assert!(!w.load_chunk(ChunkPos::new(0, 0)).entities().contains(&eid));
}

#[test]
fn login_rejects_wrong_protocol() {
  let wm = WorldManager::new_test();
  wm.add_world();

  let (conn, rx) = crate::net::ConnSender::new();
  let p = wm.handle_login(
    conn,
    sb::Packet::Login { protocol: 38, username: "old_timer".into() },
  );
  assert!(p.is_none());
  assert!(matches!(rx.try_recv().unwrap(), cb::Packet::Kick { .. }));

  let (conn, rx) = crate::net::ConnSender::new();
  let p = wm.handle_login(
    conn,
    sb::Packet::Login { protocol: 39, username: "newcomer".into() },
  );
  assert!(p.is_some());
  assert!(matches!(rx.try_recv().unwrap(), cb::Packet::Login { .. }));
}
