//! Thread pool control for the clustering algorithms.
//!
//! The number of worker threads is fixed for the duration of one merge call;
//! every parallel loop inside that call runs on the same pool.

use pweld_core::{Error, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Thread pool configuration for a merge call.
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of worker threads; 0 lets the runtime pick one per core.
    pub num_threads: usize,
    /// Thread name prefix for debugging and profiling.
    pub thread_name_prefix: String,
}

impl ThreadPoolConfig {
    /// Configuration that lets the runtime choose the thread count.
    pub fn new() -> Self {
        Self {
            num_threads: 0,
            thread_name_prefix: "pweld".to_string(),
        }
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the pool that a merge call will run on.
pub(crate) fn build_pool(config: &ThreadPoolConfig) -> Result<ThreadPool> {
    let prefix = config.thread_name_prefix.clone();
    ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .thread_name(move |i| format!("{}-{}", prefix, i))
        .build()
        .map_err(|e| Error::Algorithm(format!("failed to build thread pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_respects_thread_count() {
        let pool = build_pool(&ThreadPoolConfig::new().with_threads(3)).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn zero_threads_means_default() {
        let pool = build_pool(&ThreadPoolConfig::new()).unwrap();
        assert!(pool.current_num_threads() >= 1);
    }
}
