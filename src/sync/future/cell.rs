// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sync::mono_barrier::MonoBarrier;
use crate::sync::spinlock::Spinlock;

/// Callback invoked exactly once with the settled result of a `Core`
pub type Continuation<T> = Box<dyn FnOnce(&Result<T>) + Send + 'static>;

type Job = Box<dyn FnOnce()>;

thread_local! {
    // Settlements triggered while this thread is already running continuations.
    // `None` when no settlement is in progress on this thread.
    static DEFERRED: RefCell<Option<VecDeque<Job>>> = RefCell::new(None);
}

/// Run `job` now, or queue it behind the settlement this thread is already
/// running. Settling a long chain then takes constant stack depth.
fn dispatch(job: Job) {
    let mut job = Some(job);
    let outermost = DEFERRED.try_with(|deferred| {
        let mut deferred = deferred.borrow_mut();
        match deferred.as_mut() {
            Some(queue) => {
                queue.extend(job.take());
                false
            }
            None => {
                *deferred = Some(VecDeque::new());
                true
            }
        }
    });

    match outermost {
        Ok(false) => {}
        Ok(true) => {
            let _draining = Draining;
            if let Some(job) = job.take() {
                job();
            }
            run_deferred();
        }
        // Thread-local storage is being torn down
        Err(..) => {
            if let Some(job) = job.take() {
                job();
            }
        }
    }
}

/// Run every queued job on this thread, including ones queued meanwhile
fn run_deferred() {
    loop {
        let job = DEFERRED.try_with(|deferred| deferred.borrow_mut().as_mut().and_then(VecDeque::pop_front));
        match job {
            Ok(Some(job)) => job(),
            _ => break,
        }
    }
}

struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        // Non-empty only after a continuation panicked
        let leftover = DEFERRED.try_with(|deferred| deferred.borrow_mut().take());
        drop(leftover);
    }
}

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Settled(Arc<Result<T>>),
}

/// The shared data behind a `Promise`
///
/// A `Core` starts out pending and is settled at most once. Continuations
/// registered while pending are run in registration order by the settling
/// thread; continuations registered afterwards run immediately on the
/// registering thread. No continuation ever runs while the lock is held.
///
/// A core settled from inside a continuation runs its own continuations only
/// after the current ones return, so chains of any length settle iteratively.
pub struct Core<T> {
    state: Spinlock<State<T>>,
}

impl<T> Core<T>
    where T: Send + Sync + 'static
{
    pub fn new() -> Core<T> {
        Core { state: Spinlock::new(State::Pending(Vec::new())) }
    }

    pub fn with_result(result: Result<T>) -> Core<T> {
        Core { state: Spinlock::new(State::Settled(Arc::new(result))) }
    }

    /// Settle the core. Returns `false` if it had already been settled, in
    /// which case `result` is dropped.
    pub fn settle(&self, result: Result<T>) -> bool {
        let result = Arc::new(result);

        let continuations = {
            let mut state = self.state.lock();
            match mem::replace(&mut *state, State::Settled(result.clone())) {
                State::Pending(continuations) => continuations,
                State::Settled(previous) => {
                    *state = State::Settled(previous);
                    trace!("Ignoring late settlement of an already settled core");
                    return false;
                }
            }
        };

        match *result {
            Ok(..) => trace!("Core fulfilled, running {} continuations", continuations.len()),
            Err(ref err) => trace!("Core rejected with {}, running {} continuations", err, continuations.len()),
        }

        if !continuations.is_empty() {
            dispatch(Box::new(move || {
                for continuation in continuations {
                    continuation(&result);
                }
            }));
        }

        true
    }

    /// Run `continuation` once this core has settled
    pub fn on_settle(&self, continuation: Continuation<T>) {
        let result = {
            let mut state = self.state.lock();
            match *state {
                State::Pending(ref mut continuations) => {
                    continuations.push(continuation);
                    return;
                }
                State::Settled(ref result) => result.clone(),
            }
        };

        continuation(&result);
    }

    /// The settled result, if any
    pub fn peek(&self) -> Option<Arc<Result<T>>> {
        match *self.state.lock() {
            State::Pending(..) => None,
            State::Settled(ref result) => Some(result.clone()),
        }
    }

    /// Block the current thread until the core is settled
    pub fn wait(&self) -> Arc<Result<T>> {
        if let Some(result) = self.peek() {
            return result;
        }

        let barrier = Arc::new(MonoBarrier::new());
        {
            let barrier = barrier.clone();
            self.on_settle(Box::new(move |_| barrier.notify()));
        }

        // The settlement may be queued behind the continuation this thread is running
        run_deferred();

        // Only this thread waits on the fresh barrier, so it can't be occupied
        if let Err(err) = barrier.wait() {
            error!("Failed to wait for settlement: {:?}", err);
        }

        self.peek().unwrap_or_else(|| Arc::new(Err(Error::Abandoned)))
    }
}

impl<T> Default for Core<T>
    where T: Send + Sync + 'static
{
    fn default() -> Core<T> {
        Core::new()
    }
}

impl<T> fmt::Debug for Core<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.state.try_lock() {
            None => write!(f, "Core(<locked>)"),
            Some(state) => match *state {
                State::Pending(ref c) => write!(f, "Core(Pending, {} continuations)", c.len()),
                State::Settled(ref r) if r.is_ok() => write!(f, "Core(Fulfilled)"),
                State::Settled(..) => write!(f, "Core(Rejected)"),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_settles_once() {
        let core = Core::new();
        assert!(core.peek().is_none());
        assert!(core.settle(Ok(1)));
        assert!(!core.settle(Ok(2)));
        assert!(!core.settle(Err(Error::msg("late"))));
        assert_eq!(*core.peek().unwrap(), Ok(1));
    }

    #[test]
    fn test_continuations_in_registration_order() {
        let core = Core::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            core.on_settle(Box::new(move |r: &Result<u32>| {
                order.lock().unwrap().push((i, r.clone()));
            }));
        }

        assert!(order.lock().unwrap().is_empty());
        core.settle(Ok(7));

        let order = order.lock().unwrap();
        assert_eq!(order.iter().map(|&(i, _)| i).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(order.iter().all(|&(_, ref r)| *r == Ok(7)));
    }

    #[test]
    fn test_register_after_settle_fires_immediately() {
        let core = Core::with_result(Err(Error::msg("nope")));
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let hits = hits.clone();
            core.on_settle(Box::new(move |r: &Result<()>| {
                assert_eq!(*r, Err(Error::msg("nope")));
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_continuation_may_register_on_same_core() {
        let core = Arc::new(Core::new());
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let inner = core.clone();
            let hits = hits.clone();
            core.on_settle(Box::new(move |_: &Result<u8>| {
                let hits = hits.clone();
                inner.on_settle(Box::new(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }));
            }));
        }

        core.settle(Ok(0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deep_chain_settles_iteratively() {
        const DEPTH: usize = 100_000;

        let head = Arc::new(Core::new());
        let mut tail = head.clone();
        for _ in 0..DEPTH {
            let next = Arc::new(Core::new());
            {
                let next = next.clone();
                tail.on_settle(Box::new(move |r: &Result<usize>| {
                    next.settle(r.clone().map(|v| v + 1));
                }));
            }
            tail = next;
        }

        assert!(head.settle(Ok(0)));
        assert_eq!(*tail.peek().unwrap(), Ok(DEPTH));
    }

    #[test]
    fn test_nested_settlement_keeps_per_core_order() {
        let outer = Arc::new(Core::new());
        let inner = Arc::new(Core::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            inner.on_settle(Box::new(move |_: &Result<()>| order.lock().unwrap().push(("inner", i))));
        }

        {
            let inner = inner.clone();
            let order = order.clone();
            outer.on_settle(Box::new(move |_: &Result<()>| {
                inner.settle(Ok(()));
                order.lock().unwrap().push(("outer", 0));
            }));
        }
        {
            let order = order.clone();
            outer.on_settle(Box::new(move |_: &Result<()>| order.lock().unwrap().push(("outer", 1))));
        }

        outer.settle(Ok(()));

        assert_eq!(*order.lock().unwrap(),
                   vec![("outer", 0), ("outer", 1), ("inner", 0), ("inner", 1), ("inner", 2)]);
    }

    #[test]
    fn test_wait_inside_continuation() {
        let outer = Arc::new(Core::new());
        let seen = Arc::new(Mutex::new(None));

        {
            let seen = seen.clone();
            outer.on_settle(Box::new(move |_: &Result<()>| {
                let inner = Arc::new(Core::new());
                let derived = Arc::new(Core::new());
                {
                    let derived = derived.clone();
                    inner.on_settle(Box::new(move |r: &Result<u8>| {
                        derived.settle(r.clone().map(|v| v * 2));
                    }));
                }

                inner.settle(Ok(21));
                *seen.lock().unwrap() = Some((*derived.wait()).clone());
            }));
        }

        outer.settle(Ok(()));
        assert_eq!(*seen.lock().unwrap(), Some(Ok(42)));
    }

    #[test]
    fn test_wait_across_threads() {
        let core = Arc::new(Core::new());

        let settler = {
            let core = core.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                core.settle(Ok("done"))
            })
        };

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let core = core.clone();
                thread::spawn(move || core.wait())
            })
            .collect();

        assert!(settler.join().unwrap());
        for w in waiters {
            assert_eq!(*w.join().unwrap(), Ok("done"));
        }
    }
}
