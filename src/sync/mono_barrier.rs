// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A barrier for exactly one waiting thread and one notifier

use std::fmt;
use std::sync::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Ready,
    Waiting,
}

pub struct MonoBarrier {
    lock: Mutex<State>,
    cond: Condvar,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MonoBarrierError {
    Occupied,
    PoisonError,
}

impl MonoBarrier {
    /// Create a new `MonoBarrier`
    pub fn new() -> MonoBarrier {
        MonoBarrier {
            lock: Mutex::new(State::Empty),
            cond: Condvar::new(),
        }
    }

    /// Block until `notify()` was called, fail if someone is already waiting
    ///
    /// Returns immediately if the notification already happened.
    pub fn wait(&self) -> Result<(), MonoBarrierError> {
        let mut guard = self.lock.lock().map_err(|_| MonoBarrierError::PoisonError)?;

        match *guard {
            State::Ready => {
                *guard = State::Empty;
                return Ok(());
            }
            State::Waiting => return Err(MonoBarrierError::Occupied),
            State::Empty => *guard = State::Waiting,
        }

        // Spurious wakeups leave the state at Waiting
        while *guard == State::Waiting {
            guard = self.cond.wait(guard).map_err(|_| MonoBarrierError::PoisonError)?;
        }

        *guard = State::Empty;
        Ok(())
    }

    /// Wake up the waiting thread. Otherwise mark the barrier as ready.
    pub fn notify(&self) {
        let mut guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let waiting = *guard == State::Waiting;
        *guard = State::Ready;

        if waiting {
            self.cond.notify_one();
        }
    }
}

impl Default for MonoBarrier {
    fn default() -> MonoBarrier {
        MonoBarrier::new()
    }
}

impl fmt::Debug for MonoBarrier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.lock.try_lock() {
            Ok(guard) => write!(f, "MonoBarrier({:?})", *guard),
            Err(_) => write!(f, "MonoBarrier(<locked>)"),
        }
    }
}
