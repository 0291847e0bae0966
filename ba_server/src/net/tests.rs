use super::{cb, packet, sb, ConnSender};
use crate::{block::Kind, world::WorldManager};
use ba_common::math::{FPos, Pos};
use std::{thread, time::Duration};

#[test]
fn position_look_moves_the_player() {
  let wm = WorldManager::new_test();
  wm.add_world();
  let (conn, rx) = ConnSender::new();
  let pl = wm.new_player(conn, "mover".into());
  let _ = rx;

  packet::handle(
    &wm,
    &pl,
    sb::Packet::PositionLook { x: 10.5, y: 65.0, z: 9.0, yaw: 45.0, pitch: -10.0, on_ground: true },
  );
  let (pos, yaw, pitch) = pl.pos_look();
  assert_eq!(pos, FPos::new(10.5, 65.0, 9.0));
  assert_eq!(yaw, 45.0);
  assert_eq!(pitch, -10.0);

  // A look packet keeps the position.
  packet::handle(&wm, &pl, sb::Packet::Look { yaw: 0.0, pitch: 0.0, on_ground: true });
  assert_eq!(pl.pos(), FPos::new(10.5, 65.0, 9.0));
}

#[test]
fn out_of_bounds_dig_gets_an_echo() {
  let wm = WorldManager::new_test_with(
    "[world]\ngenerator = \"flat\"\npregen-radius = 0\nwidth = 16\ndepth = 16\n",
  );
  wm.add_world();
  let (conn, rx) = ConnSender::new();
  let pl = wm.new_player(conn, "digger".into());
  while rx.try_recv().is_ok() {}

  let out = Pos::new(20, 63, 5);
  packet::handle(&wm, &pl, sb::Packet::BlockDig { pos: out, status: sb::DigStatus::Finish });

  // No update was queued; the client just gets told what is really there.
  assert_eq!(wm.physics().pending(), 0);
  let p = rx.try_recv().unwrap();
  assert!(matches!(p, cb::Packet::BlockChange { pos, .. } if pos == out));
}

#[test]
fn finished_dig_queues_an_air_write() {
  let wm = WorldManager::new_test();
  wm.add_world();
  let (conn, rx) = ConnSender::new();
  let pl = wm.new_player(conn, "miner".into());
  let _ = rx;

  let pos = Pos::new(3, 63, 3);
  assert_eq!(pl.world().get_block(pos).unwrap().kind(), Kind::Grass);
  packet::handle(&wm, &pl, sb::Packet::BlockDig { pos, status: sb::DigStatus::Finish });
  assert_eq!(wm.physics().pending(), 1);

  wm.physics().set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(300));
  wm.physics().set_worker_count(0).unwrap();
  assert_eq!(pl.world().get_block(pos).unwrap(), crate::block::Block::AIR);
}

#[test]
fn disconnect_removes_the_player() {
  let wm = WorldManager::new_test();
  wm.add_world();
  let (conn, _rx) = ConnSender::new();
  let pl = wm.new_player(conn, "quitter".into());

  packet::handle(&wm, &pl, sb::Packet::Disconnect);
  assert!(wm.get_player(pl.eid()).is_none());
  assert_eq!(wm.player_count(), 0);
}

#[test]
fn handler_runs_on_the_pool() {
  let wm = WorldManager::new_test();
  wm.add_world();
  let handler = packet::Handler::new(&wm);
  let (conn, _rx) = ConnSender::new();
  let pl = wm.new_player(conn, "pooled".into());

  handler.dispatch(
    pl.clone(),
    sb::Packet::Position { x: 12.0, y: 65.0, z: 12.0, on_ground: true },
  );
  thread::sleep(Duration::from_millis(100));
  assert_eq!(pl.pos(), FPos::new(12.0, 65.0, 12.0));
}
