// The MIT License (MIT)

// Copyright (c) 2015 Rustcc Developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Executors running the computations behind a `Promise`

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::options::{Options, DEFAULT_STACK};

/// A unit of work handed to an `Executor`
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks off the caller's thread
///
/// An executor that drops a task without running it causes the corresponding
/// promise to be rejected with `Error::Abandoned`.
pub trait Executor {
    fn execute(&self, task: Task) -> io::Result<()>;
}

impl<'a, E: Executor + ?Sized> Executor for &'a E {
    fn execute(&self, task: Task) -> io::Result<()> {
        (**self).execute(task)
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) -> io::Result<()> {
        (**self).execute(task)
    }
}

/// Spawns a fresh thread for every task
#[derive(Debug, Clone, Default)]
pub struct ThreadPerTask {
    opts: Options,
}

impl ThreadPerTask {
    pub fn new() -> ThreadPerTask {
        ThreadPerTask { opts: Options::new() }
    }

    pub fn with_options(opts: Options) -> ThreadPerTask {
        ThreadPerTask { opts: opts }
    }
}

impl Executor for ThreadPerTask {
    fn execute(&self, task: Task) -> io::Result<()> {
        match self.opts.thread_builder().spawn(task) {
            Ok(..) => Ok(()),
            Err(err) => {
                error!("Failed to spawn thread {:?}: {}", self.opts.name, err);
                Err(err)
            }
        }
    }
}

struct Queue {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    cond: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // Tasks never run under the lock, so poisoning can't leave the queue inconsistent
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed pool of worker threads sharing one FIFO queue
///
/// Workers are started by the first `execute`. Dropping the scheduler stops
/// accepting tasks, lets the workers drain whatever is already queued and
/// joins them.
pub struct Scheduler {
    expected_worker_count: usize,
    default_stack_size: usize,
    name_prefix: String,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler with one worker per CPU
    pub fn new() -> Scheduler {
        Scheduler {
            expected_worker_count: num_cpus::get(),
            default_stack_size: DEFAULT_STACK,
            name_prefix: "deferred-worker".to_owned(),
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    shutdown: false,
                }),
                cond: Condvar::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Set the number of workers
    pub fn with_workers(mut self, workers: usize) -> Scheduler {
        assert!(workers >= 1, "Must have at least one worker");
        self.expected_worker_count = workers;
        self
    }

    /// Set the stack size of the worker threads
    pub fn default_stack_size(mut self, default_stack_size: usize) -> Scheduler {
        self.default_stack_size = default_stack_size;
        self
    }

    /// Set the prefix of the worker thread names
    pub fn name_prefix<S: Into<String>>(mut self, prefix: S) -> Scheduler {
        self.name_prefix = prefix.into();
        self
    }

    /// Get the number of workers
    pub fn worker_count(&self) -> usize {
        self.expected_worker_count
    }

    /// Get the number of queued tasks not yet picked up by a worker
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// Stop accepting tasks. Already queued tasks are still run.
    pub fn shutdown(&self) {
        self.shared.lock().shutdown = true;
        self.shared.cond.notify_all();
    }

    fn start_workers(&self, workers: &mut Vec<JoinHandle<()>>) -> io::Result<()> {
        while workers.len() < self.expected_worker_count {
            let mut opts = Options::new();
            opts.stack_size(self.default_stack_size)
                .name(format!("{}-{}", self.name_prefix, workers.len()));

            let shared = self.shared.clone();
            let handle = opts.thread_builder().spawn(move || worker_loop(shared))?;
            workers.push(handle);
        }

        debug!("Scheduler started {} workers", workers.len());
        Ok(())
    }
}

fn shutting_down() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "scheduler is shutting down")
}

fn worker_loop(shared: Arc<Shared>) {
    debug!("Worker {:?} started", thread::current().name());

    loop {
        let task = {
            let mut queue = shared.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }

                if queue.shutdown {
                    debug!("Worker {:?} exiting", thread::current().name());
                    return;
                }

                queue = shared.cond.wait(queue).unwrap_or_else(PoisonError::into_inner);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("Task panicked on worker {:?}", thread::current().name());
        }
    }
}

impl Executor for Scheduler {
    fn execute(&self, task: Task) -> io::Result<()> {
        if self.shared.lock().shutdown {
            return Err(shutting_down());
        }

        {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            if workers.len() < self.expected_worker_count {
                if let Err(err) = self.start_workers(&mut workers) {
                    error!("Failed to start scheduler workers: {}", err);
                    if workers.is_empty() {
                        return Err(err);
                    }
                }
            }
        }

        let mut queue = self.shared.lock();
        if queue.shutdown {
            return Err(shutting_down());
        }

        queue.tasks.push_back(task);
        drop(queue);
        self.shared.cond.notify_one();
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Scheduler {
        Scheduler::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.expected_worker_count)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();

        let workers = match self.workers.get_mut() {
            Ok(workers) => workers,
            Err(poisoned) => poisoned.into_inner(),
        };

        let current = thread::current().id();
        for handle in workers.drain(..) {
            // A task may hold the last reference to its own scheduler
            if handle.thread().id() == current {
                continue;
            }

            if handle.join().is_err() {
                warn!("Scheduler worker terminated abnormally");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn test_thread_per_task_runs() {
        let (tx, rx) = mpsc::channel();
        ThreadPerTask::new()
            .execute(Box::new(move || tx.send(thread::current().id()).unwrap()))
            .unwrap();

        assert_ne!(rx.recv().unwrap(), thread::current().id());
    }

    #[test]
    fn test_scheduler_drains_on_drop() {
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let sched = Scheduler::new().with_workers(2);
            for _ in 0..100 {
                let counter = counter.clone();
                sched.execute(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
            }
        }

        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_scheduler_survives_panicking_task() {
        let sched = Scheduler::new().with_workers(1);
        let (tx, rx) = mpsc::channel();

        sched.execute(Box::new(|| panic!("task failure"))).unwrap();
        sched.execute(Box::new(move || tx.send(42).unwrap())).unwrap();

        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    fn test_worker_names() {
        let sched = Scheduler::new().with_workers(1).name_prefix("pool");
        let (tx, rx) = mpsc::channel();

        sched.execute(Box::new(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap()
        }))
        .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("pool-0"));
        assert_eq!(sched.worker_count(), 1);
    }

    #[test]
    fn test_execute_after_shutdown() {
        let sched = Scheduler::new().with_workers(1);
        let (tx, rx) = mpsc::channel();

        sched.execute(Box::new(move || tx.send(()).unwrap())).unwrap();
        sched.shutdown();

        assert!(sched.execute(Box::new(|| {})).is_err());
        assert_eq!(rx.recv(), Ok(()));
    }

    #[test]
    fn test_execute_after_shutdown_starts_no_workers() {
        let sched = Scheduler::new().with_workers(2);
        sched.shutdown();

        assert!(sched.execute(Box::new(|| {})).is_err());
        assert!(sched.workers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partially_started_pool_is_completed() {
        let mut sched = Scheduler::new().with_workers(1);
        sched.execute(Box::new(|| {})).unwrap();
        assert_eq!(sched.workers.lock().unwrap().len(), 1);

        // As if the second spawn had failed on the first attempt
        sched.expected_worker_count = 3;

        let (tx, rx) = mpsc::channel();
        sched.execute(Box::new(move || tx.send(()).unwrap())).unwrap();
        assert_eq!(rx.recv(), Ok(()));
        assert_eq!(sched.workers.lock().unwrap().len(), 3);
    }

    #[test]
    #[should_panic(expected = "Must have at least one worker")]
    fn test_zero_workers() {
        let _ = Scheduler::new().with_workers(0);
    }
}
