use super::{Action, ActionKind, Physics, Update, UpdateData, TICK_TIME};
use crate::block::Block;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
  io,
  panic::{self, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
  },
  thread,
  time::{Duration, Instant},
};

/// One physics worker thread. Dropping a worker signals its thread and
/// joins it; the thread notices at its next tick boundary, so teardown
/// takes at most one tick.
pub(super) struct Worker {
  running: Arc<AtomicBool>,
  handle:  Option<thread::JoinHandle<()>>,
}

impl Worker {
  pub fn spawn(man: Weak<Physics>) -> io::Result<Worker> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let handle =
      thread::Builder::new().name("physics worker".into()).spawn(move || main_loop(man, r))?;
    Ok(Worker { running, handle: Some(handle) })
  }
}

impl Drop for Worker {
  fn drop(&mut self) {
    self.running.store(false, Ordering::Relaxed);
    if let Some(h) = self.handle.take() {
      let _ = h.join();
    }
  }
}

/// Where everything happens.
fn main_loop(man: Weak<Physics>, running: Arc<AtomicBool>) {
  let mut rnd = SmallRng::from_entropy();
  while running.load(Ordering::Relaxed) {
    spin_sleep::sleep(TICK_TIME);
    let man = match man.upgrade() {
      Some(m) => m,
      None => break,
    };
    run_batch(&man, &running, &mut rnd);
  }
}

fn run_batch(man: &Arc<Physics>, running: &AtomicBool, rnd: &mut SmallRng) {
  // Counts failed pops. A failed pop means another worker won the race, so
  // back off a little, and give up on this batch if it keeps happening.
  let mut fcount = 0;
  for _ in 0..man.updates_per_tick {
    if !running.load(Ordering::Relaxed) || man.rx.is_empty() {
      break;
    }
    let u = match man.rx.try_recv() {
      Ok(u) => u,
      Err(_) => {
        fcount += 1;
        if fcount % 15 == 0 {
          thread::sleep(Duration::from_millis(2));
        }
        if fcount == 60 {
          break;
        }
        continue;
      }
    };

    // The queue is not time ordered. An early draw goes to the back of the
    // queue, and still counts against the batch.
    if u.ready_at > Instant::now() {
      man.push(u);
      continue;
    }

    process(man, u, rnd);
  }
}

enum Strip {
  /// An action consumed the update. Nothing further runs.
  Consumed,
  Live { requeued: bool },
}

/// Walks the action strip. Decay actions may consume the update; any
/// non-retired slot re-queues a copy for the next cycle.
fn handle_params(man: &Arc<Physics>, u: &mut Update, rnd: &mut SmallRng) -> Strip {
  let mut keep = false;
  let mut dissipated = false;
  for act in u.params.actions.iter_mut() {
    if act.kind == ActionKind::None {
      break;
    }
    if act.expire == 0 {
      continue;
    }
    match act.kind {
      ActionKind::Dissipate => {
        if rnd.gen_range(0..=i32::from(act.val.max(0))) == 0 {
          dissipated = true;
          break;
        }
      }
      // Reserved for block behaviors; nothing to do here.
      ActionKind::Drop => {}
      ActionKind::None => unreachable!(),
    }
    if act.expire != Action::PERMANENT {
      act.expire -= 1;
    }
    keep = true;
  }

  if dissipated {
    if let UpdateData::Block { pos, .. } = u.data {
      u.world.queue_update(pos, Block::AIR);
    }
    return Strip::Consumed;
  }

  if keep {
    let mut nu = u.clone();
    nu.ready_at = Instant::now() + TICK_TIME * nu.delay;
    // The copy is a live update in its own right, so it gets its own count.
    if let UpdateData::Block { pos, .. } = nu.data {
      man.mem.lock().add(nu.world.wid(), pos);
    }
    man.push(nu);
    return Strip::Live { requeued: true };
  }
  Strip::Live { requeued: false }
}

fn process(man: &Arc<Physics>, mut u: Update, rnd: &mut SmallRng) {
  let requeued = match handle_params(man, &mut u, rnd) {
    Strip::Consumed => {
      // The popped update is done; its count comes off like any other.
      if let UpdateData::Block { pos, .. } = u.data {
        man.mem.lock().remove(u.world.wid(), pos);
      }
      return;
    }
    Strip::Live { requeued } => requeued,
  };

  match u.data {
    UpdateData::Block { pos, extra, cb } => {
      // Decrement before dispatch, so a callback that re-queues this cell
      // sees an accurate count.
      man.mem.lock().remove(u.world.wid(), pos);

      let world = u.world;
      let res = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(cb) = cb {
          cb(&world, pos, extra, rnd);
        } else {
          let kind = world.get_block(pos).map(|b| b.kind()).unwrap_or(crate::block::Kind::Air);
          if let Some(b) = world.behaviors().get(kind) {
            b.tick(&world, pos, extra, rnd);
          }
        }
      }));
      if res.is_err() {
        warn!("block update at {pos} panicked, dropping update");
      }
    }
    UpdateData::Entity { eid, persistent } => {
      let ent = match u.world.entity(eid) {
        Some(e) => e,
        // Already despawned.
        None => return,
      };
      // A player can move between worlds while updates for them are still
      // queued. Those stale updates are dropped, not re-queued.
      if let Some(pl) = ent.as_player(&u.world) {
        if pl.world().wid() != u.world.wid() {
          return;
        }
      }
      let world = u.world.clone();
      let terminal = match panic::catch_unwind(AssertUnwindSafe(|| ent.tick(&world))) {
        Ok(t) => t,
        Err(_) => {
          warn!("entity {eid} tick panicked, dropping update");
          return;
        }
      };
      if terminal {
        if ent.as_entity().is_some() {
          u.world.despawn(eid);
        }
      } else if persistent && !requeued {
        let mut nu = u.clone();
        nu.ready_at = Instant::now() + TICK_TIME * nu.delay;
        man.push(nu);
      }
    }
  }
}
