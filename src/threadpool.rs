//! A bounded job-queue thread pool for frame-parallel work: a fixed-size
//! ring buffer of boxed job closures shared by worker threads, woken with
//! a condvar, with an atomic completed-job counter `wait_all` spins on.
//! `dispatch` partitions a `job_count` into `job_count / group_size` jobs,
//! each handed a `(job_index, group_index)` pair.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{CapacityExceeded, Error, Result};

/// Fixed capacity of the job ring buffer.
const RING_BUFFER_CAPACITY: usize = 512;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug)]
pub struct DispatchArgs {
    pub job_index: u32,
    pub group_index: u32,
}

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    wake: Condvar,
    jobs_queued: AtomicU64,
    jobs_completed: AtomicU64,
    exit_requested: std::sync::atomic::AtomicBool,
}

/// A pool of OS worker threads draining a shared job ring buffer.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `thread_count` workers (at least 1).
    pub fn new(thread_count: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
            wake: Condvar::new(),
            jobs_queued: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            exit_requested: std::sync::atomic::AtomicBool::new(false),
        });

        let thread_count = thread_count.max(1);
        let workers = (0..thread_count)
            .map(|worker_idx| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("wavefront-rt-worker-{worker_idx}"))
                    .spawn(move || Self::worker_loop(shared))
                    .expect("failed to spawn render worker thread")
            })
            .collect();

        Self { shared, workers }
    }

    fn worker_loop(shared: Arc<Shared>) {
        loop {
            let job = {
                let mut queue = shared.queue.lock();
                loop {
                    if let Some(job) = queue.pop_front() {
                        break Some(job);
                    }
                    if shared.exit_requested.load(Ordering::Acquire) {
                        break None;
                    }
                    shared.wake.wait(&mut queue);
                }
            };

            match job {
                Some(job) => {
                    job();
                    shared.jobs_completed.fetch_add(1, Ordering::AcqRel);
                }
                None => break,
            }
        }
    }

    /// Queues a single closure, returning `CapacityExceeded` if the ring
    /// buffer is momentarily full (the caller should back off and retry).
    pub fn queue_job(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        if queue.len() >= RING_BUFFER_CAPACITY {
            return Err(Error::from(CapacityExceeded::RingBufferExhausted {
                requested: 1,
                capacity: RING_BUFFER_CAPACITY,
            }));
        }

        queue.push_back(Box::new(job));
        self.shared.jobs_queued.fetch_add(1, Ordering::AcqRel);
        drop(queue);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Partitions `job_count` dispatch groups of `group_size` onto the
    /// pool, back-pressuring with a yield+retry loop when the ring buffer
    /// is briefly full rather than failing the whole dispatch.
    pub fn dispatch<F>(&self, job_count: u32, group_size: u32, job_func: F)
    where
        F: Fn(DispatchArgs) + Send + Sync + 'static,
    {
        let job_func = Arc::new(job_func);

        for job_index in 0..job_count {
            let job_func = job_func.clone();
            let args = DispatchArgs {
                job_index,
                group_index: job_index / group_size.max(1),
            };

            loop {
                match self.queue_job(move || job_func(args)) {
                    Ok(()) => break,
                    Err(_) => std::thread::yield_now(),
                }
            }
        }

        self.shared.wake.notify_all();
    }

    pub fn is_busy(&self) -> bool {
        self.shared.jobs_completed.load(Ordering::Acquire)
            != self.shared.jobs_queued.load(Ordering::Acquire)
    }

    /// Spins until every job queued so far has completed.
    pub fn wait_all(&self) {
        while self.is_busy() {
            self.shared.wake.notify_all();
            std::thread::yield_now();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.exit_requested.store(true, Ordering::Release);
        self.shared.wake.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
