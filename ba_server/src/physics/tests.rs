use super::*;
use crate::{
  block::{Block, Kind},
  entity::{Behavior, Entity, EntityData, EntityPos, ShouldDespawn},
  world::{World, WorldManager},
};
use parking_lot::{lock_api::RawMutex as _, Mutex as PMutex};
use rand::rngs::SmallRng;
use std::{
  sync::atomic::{AtomicU32, Ordering as AOrdering},
  thread,
  time::Duration,
};

fn test_world() -> (Arc<WorldManager>, Arc<World>) {
  let wm = WorldManager::new_test();
  let w = wm.add_world();
  (wm, w)
}

fn noop_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {}

#[test]
fn dedup_suppresses_queue_once() {
  let (wm, w) = test_world();
  let phys = wm.physics();
  let pos = Pos::new(8, 64, 8);

  phys.queue_block(&w, pos, 0, 1, None, Some(noop_cb));
  assert_eq!(phys.count_at(&w, pos), 1);
  assert_eq!(phys.pending(), 1);

  // Exactly one update stays pending.
  phys.queue_block_once(&w, pos, 0, 1, None, Some(noop_cb));
  assert_eq!(phys.count_at(&w, pos), 1);
  assert_eq!(phys.pending(), 1);

  // queue_block always queues, though.
  phys.queue_block(&w, pos, 0, 1, None, Some(noop_cb));
  assert_eq!(phys.count_at(&w, pos), 2);
  assert_eq!(phys.pending(), 2);
}

#[test]
fn queue_once_is_idempotent() {
  let (wm, w) = test_world();
  let phys = wm.physics();
  let pos = Pos::new(1, 70, 1);
  for _ in 0..10 {
    phys.queue_block_once(&w, pos, 0, 1, None, Some(noop_cb));
  }
  assert_eq!(phys.count_at(&w, pos), 1);
  assert_eq!(phys.pending(), 1);
}

#[test]
fn membership_is_per_cell_and_per_world() {
  let (wm, a) = test_world();
  let b = wm.add_world();
  let phys = wm.physics();
  let pos = Pos::new(3, 64, 3);

  phys.queue_block(&a, pos, 0, 1, None, Some(noop_cb));
  assert_eq!(phys.count_at(&a, pos), 1);
  assert_eq!(phys.count_at(&b, pos), 0);
  assert_eq!(phys.count_at(&a, pos.with_x(4)), 0);

  // The same cell in another world dedups independently.
  phys.queue_block_once(&b, pos, 0, 1, None, Some(noop_cb));
  assert_eq!(phys.count_at(&b, pos), 1);
}

static CASCADE_CALLS: AtomicU32 = AtomicU32::new(0);
fn cascade_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {
  CASCADE_CALLS.fetch_add(1, AOrdering::SeqCst);
}

#[test]
fn cascade_dedup() {
  let (wm, w) = test_world();
  let phys = wm.physics();
  let pos = Pos::new(8, 64, 8);

  // A thousand concurrent triggers at one cell collapse into one callback.
  let mut handles = vec![];
  for _ in 0..8 {
    let w = w.clone();
    let phys = phys.clone();
    handles.push(thread::spawn(move || {
      for _ in 0..125 {
        phys.queue_block_once(&w, pos, 0, 1, None, Some(cascade_cb));
      }
    }));
  }
  for h in handles {
    h.join().unwrap();
  }
  assert_eq!(phys.pending(), 1);

  phys.set_worker_count(2).unwrap();
  thread::sleep(Duration::from_millis(300));
  assert_eq!(CASCADE_CALLS.load(AOrdering::SeqCst), 1);
  assert_eq!(phys.count_at(&w, pos), 0);
  assert_eq!(phys.pending(), 0);
  phys.set_worker_count(0).unwrap();
}

static CONSERVE_CALLS: AtomicU32 = AtomicU32::new(0);
fn conserve_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {
  CONSERVE_CALLS.fetch_add(1, AOrdering::SeqCst);
}

#[test]
fn counter_conservation_after_drain() {
  let (wm, w) = test_world();
  let phys = wm.physics();

  let cells: Vec<Pos> = (0..40).map(|i| Pos::new(i % 16, 64 + i / 16, (i * 7) % 16)).collect();
  for (i, &pos) in cells.iter().enumerate() {
    // Mix of plain and deduped queues; the dedup calls at fresh cells all
    // go through.
    if i % 2 == 0 {
      phys.queue_block(&w, pos, 0, 1, None, Some(conserve_cb));
    } else {
      phys.queue_block_once(&w, pos, 0, 1, None, Some(conserve_cb));
    }
    assert_eq!(phys.count_at(&w, pos), 1);
  }

  phys.set_worker_count(3).unwrap();
  thread::sleep(Duration::from_millis(400));
  phys.set_worker_count(0).unwrap();

  // Quiescent: every counter matches the number of live updates (zero).
  assert_eq!(CONSERVE_CALLS.load(AOrdering::SeqCst), 40);
  assert_eq!(phys.pending(), 0);
  for &pos in &cells {
    assert_eq!(phys.count_at(&w, pos), 0);
  }
}

static DELAY_DONE: PMutex<Option<Instant>> =
  PMutex::const_new(parking_lot::RawMutex::INIT, None);
fn delay_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {
  *DELAY_DONE.lock() = Some(Instant::now());
}

#[test]
fn tick_delay_is_monotonic() {
  let (wm, w) = test_world();
  let phys = wm.physics();

  let t0 = Instant::now();
  phys.queue_block(&w, Pos::new(0, 64, 0), 0, 5, None, Some(delay_cb));
  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(600));
  phys.set_worker_count(0).unwrap();

  let done = DELAY_DONE.lock().expect("update never processed");
  // tick_delay of 5 means the update is not ready for 4 full ticks.
  assert!(done - t0 >= Duration::from_millis(200), "processed after {:?}", done - t0);
}

#[test]
fn dissipate_zero_consumes_on_first_tick() {
  let (wm, w) = test_world();
  let phys = wm.physics();
  let pos = Pos::new(0, 64, 0);

  w.set_block(pos, Block::from_kind(Kind::Stone)).unwrap();
  let params = Params::new().with(Action::dissipate(0));
  phys.queue_block(&w, pos, 0, 1, Some(params), None);

  phys.set_worker_count(1).unwrap();
  // One tick to dissipate, one for the queued air write.
  thread::sleep(Duration::from_millis(300));
  phys.set_worker_count(0).unwrap();

  assert_eq!(w.get_block(pos).unwrap(), Block::AIR);
  assert_eq!(phys.count_at(&w, pos), 0);
  assert_eq!(phys.pending(), 0);
}

#[test]
fn dissipate_decays_stochastically() {
  let (wm, w) = test_world();
  let phys = wm.physics();

  let cells: Vec<Pos> = (0..64).map(|i| Pos::new(i % 8, 100, i / 8)).collect();
  for &pos in &cells {
    w.set_block(pos, Block::from_kind(Kind::Stone)).unwrap();
    // Survives each tick with probability 1/2.
    phys.queue_block(&w, pos, 0, 1, Some(Params::new().with(Action::dissipate(1))), None);
  }

  phys.set_worker_count(2).unwrap();
  thread::sleep(Duration::from_millis(1500));
  phys.set_worker_count(0).unwrap();

  // After ~25 ticks the odds of any one cell surviving are 2^-25.
  let gone = cells.iter().filter(|&&pos| w.get_block(pos).unwrap() == Block::AIR).count();
  assert!(gone >= 60, "only {gone}/64 cells dissipated");
}

static EXPIRE_CALLS: AtomicU32 = AtomicU32::new(0);
fn expire_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {
  EXPIRE_CALLS.fetch_add(1, AOrdering::SeqCst);
}

#[test]
fn action_expiry_requeues_until_retired() {
  let (wm, w) = test_world();
  let phys = wm.physics();
  let pos = Pos::new(5, 80, 5);

  // A Drop action with a 2 tick lifetime keeps the update alive for two
  // re-queues, so the callback runs three times in total.
  let params =
    Params::new().with(Action { kind: ActionKind::Drop, expire: 2, val: 0 });
  phys.queue_block(&w, pos, 0, 1, Some(params), Some(expire_cb));

  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(500));
  phys.set_worker_count(0).unwrap();

  assert_eq!(EXPIRE_CALLS.load(AOrdering::SeqCst), 3);
  assert_eq!(phys.count_at(&w, pos), 0);
  assert_eq!(phys.pending(), 0);
}

struct CountedTicks {
  ticks:    Arc<AtomicU32>,
  done_at:  Arc<PMutex<Option<Instant>>>,
  terminal: u32,
}

impl Behavior for CountedTicks {
  fn tick(&mut self, _: &EntityData, _: &mut EntityPos) -> ShouldDespawn {
    let n = self.ticks.fetch_add(1, AOrdering::SeqCst) + 1;
    if n >= self.terminal {
      *self.done_at.lock() = Some(Instant::now());
      ShouldDespawn(true)
    } else {
      ShouldDespawn(false)
    }
  }
}

#[test]
fn persistent_entity_requeues_until_terminal() {
  let (wm, w) = test_world();
  let phys = wm.physics();

  let ticks = Arc::new(AtomicU32::new(0));
  let done_at = Arc::new(PMutex::new(None));
  let eid = wm.new_eid();
  let data = EntityData::new_custom(
    eid,
    crate::entity::Kind::Mob,
    ba_common::math::FPos::new(8.0, 64.0, 8.0),
    CountedTicks { ticks: ticks.clone(), done_at: done_at.clone(), terminal: 3 },
  );
  w.add_entity(eid, Entity::Entity(Arc::new(data)));

  let t0 = Instant::now();
  phys.queue_entity(&w, eid, true, 5, None);
  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(1200));
  phys.set_worker_count(0).unwrap();

  // Ticked false twice, so exactly two re-enqueues, then consumption.
  assert_eq!(ticks.load(AOrdering::SeqCst), 3);
  assert_eq!(phys.pending(), 0);
  // The entity reached its terminal state and was despawned.
  assert!(w.entity(eid).is_none());
  let done = done_at.lock().expect("entity never reached terminal state");
  // 4 ticks to the first run, then 5 per re-queue.
  assert!(done - t0 >= Duration::from_millis(650), "done after {:?}", done - t0);
}

#[test]
fn stale_cross_world_update_is_dropped() {
  let wm = WorldManager::new_test();
  let a = wm.add_world();
  let b = wm.add_world();
  let phys = wm.physics();

  let (conn, _rx) = crate::net::ConnSender::new();
  let pl = wm.new_player(conn, "macey".into());
  assert_eq!(pl.world().wid(), a.wid());

  // Pretend world b still has a stale entry for this player, the way a
  // world switch leaves one queued.
  b.add_entity(pl.eid(), Entity::Player(pl.eid()));
  phys.queue_entity(&b, pl.eid(), true, 1, None);

  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(400));
  phys.set_worker_count(0).unwrap();

  // The stale update was dropped without re-queueing. Only the player's
  // own keepalive update (queued by the world join) is still alive.
  assert_eq!(phys.pending(), 1);
  assert!(wm.get_player(pl.eid()).is_some(), "player should not have been kicked");
}

static PANIC_AFTER: AtomicU32 = AtomicU32::new(0);
fn panic_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {
  panic!("callback exploded");
}
fn after_panic_cb(_: &Arc<World>, _: Pos, _: i32, _: &mut SmallRng) {
  PANIC_AFTER.fetch_add(1, AOrdering::SeqCst);
}

#[test]
fn callback_panic_consumes_update() {
  let (wm, w) = test_world();
  let phys = wm.physics();
  let pos = Pos::new(2, 64, 2);

  phys.queue_block(&w, pos, 0, 1, None, Some(panic_cb));
  phys.queue_block(&w, pos.with_x(3), 0, 2, None, Some(after_panic_cb));

  phys.set_worker_count(1).unwrap();
  thread::sleep(Duration::from_millis(300));
  phys.set_worker_count(0).unwrap();

  // The panicking update is consumed, not retried, and the worker keeps
  // going.
  assert_eq!(phys.count_at(&w, pos), 0);
  assert_eq!(phys.pending(), 0);
  assert_eq!(PANIC_AFTER.load(AOrdering::SeqCst), 1);
}

#[test]
fn worker_count_caps_and_shrinks() {
  let (wm, _w) = test_world();
  let phys = wm.physics();

  phys.set_worker_count(50).unwrap();
  assert_eq!(phys.worker_count(), 20);
  phys.set_worker_count(2).unwrap();
  assert_eq!(phys.worker_count(), 2);
  phys.set_worker_count(0).unwrap();
  assert_eq!(phys.worker_count(), 0);
}
