mod pool;

pub use pool::{PoolFull, ThreadPool};

/// Returns the number of logical cores on this system.
pub fn num_cpus() -> usize { num_cpus::get() }
