use crossbeam_channel::{Sender, TrySendError};
use std::{fmt, thread};

type BoxFn<S> = Box<dyn FnOnce(&S) + Send>;

/// A pool of threads. Each thread is created with some state. The
/// `new_state` function passed to the constructor is called once for every
/// thread that is created, and the state is then passed to each task the
/// thread executes. This can be used for things such as cloning an arc on
/// initialization, instead of cloning it every time you call `execute`.
pub struct ThreadPool<S> {
  tx: Sender<BoxFn<S>>,
}

/// Returned from [`ThreadPool::try_execute`] when the task queue is full.
#[derive(Debug, PartialEq, Eq)]
pub struct PoolFull;

impl fmt::Display for PoolFull {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "thread pool task queue is full")
  }
}

impl std::error::Error for PoolFull {}

impl<S: Send + 'static> ThreadPool<S> {
  /// Creates a thread pool with the same number of workers as logical cores
  /// on the system.
  pub fn auto<F: Fn() -> S>(name: &str, new_state: F) -> Self {
    ThreadPool::new(name, num_cpus::get() as u32, new_state)
  }

  /// Creates a thread pool with the given number of worker threads. The name
  /// is given to each spawned thread, which makes backtraces much easier to
  /// read.
  ///
  /// # Panics
  ///
  /// Panics if the number of workers is 0.
  pub fn new<F: Fn() -> S>(name: &str, workers: u32, new_state: F) -> Self {
    if workers == 0 {
      panic!("cannot create a thread pool with no workers");
    }
    let (tx, rx) = crossbeam_channel::bounded::<BoxFn<S>>(256);
    for _ in 0..workers {
      let s = new_state();
      let rx = rx.clone();
      thread::Builder::new()
        .name(name.into())
        .spawn(move || {
          while let Ok(f) = rx.recv() {
            f(&s)
          }
        })
        .expect("failed to spawn pool worker");
    }
    ThreadPool { tx }
  }

  /// Executes the given task on the next free worker thread. Blocks if the
  /// task queue is full.
  pub fn execute<F: FnOnce(&S) + Send + 'static>(&self, f: F) {
    self.tx.send(Box::new(f)).expect("thread pool unexpectedly closed");
  }

  /// Executes the given task, unless the task queue is full. Use this from
  /// latency-sensitive callers that would rather retry later than block.
  pub fn try_execute<F: FnOnce(&S) + Send + 'static>(&self, f: F) -> Result<(), PoolFull> {
    match self.tx.try_send(Box::new(f)) {
      Ok(()) => Ok(()),
      Err(TrySendError::Full(_)) => Err(PoolFull),
      Err(TrySendError::Disconnected(_)) => panic!("thread pool unexpectedly closed"),
    }
  }

  /// Waits for all queued tasks to be picked up by a worker.
  pub fn wait(&self) {
    while !self.tx.is_empty() {
      thread::yield_now();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
  };

  #[test]
  fn executes_with_state() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    let pool = ThreadPool::new("test pool", 4, move || c.clone());
    for _ in 0..64 {
      pool.execute(|c| {
        c.fetch_add(1, Ordering::SeqCst);
      });
    }
    pool.wait();
    // wait() only waits for pickup, so give the last tasks a moment to run.
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(counter.load(Ordering::SeqCst), 64);
  }
}
