// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Combine many promises into one
//!
//! All inputs must share one value type. Inputs of different types can be
//! projected into a common enum with `Promise::on_success` first, or paired
//! with `Promise::zip`.

use std::mem;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::promise::Promise;
use crate::sync::future::Core;
use crate::sync::spinlock::Spinlock;

/// How a single input of `all_settled` ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(Error),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(*self, Outcome::Success(..))
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Success(val) => Ok(val),
            Outcome::Failure(err) => Err(err),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Outcome<T> {
        match result {
            Ok(val) => Outcome::Success(val),
            Err(err) => Outcome::Failure(err),
        }
    }
}

/// Results collected by input index, released once every slot is filled
struct Gather<S> {
    slots: Vec<Option<S>>,
    remaining: usize,
}

impl<S> Gather<S> {
    fn new(len: usize) -> Gather<S> {
        Gather {
            slots: (0..len).map(|_| None).collect(),
            remaining: len,
        }
    }

    fn fill(&mut self, idx: usize, val: S) -> Option<Vec<S>> {
        if self.slots[idx].replace(val).is_none() {
            self.remaining -= 1;
        }

        if self.remaining == 0 {
            Some(mem::take(&mut self.slots).into_iter().flatten().collect())
        } else {
            None
        }
    }
}

/// Fulfil with every value in input order, or reject with the first error
///
/// An empty input fulfils immediately with an empty `Vec`. Results that
/// arrive after the first rejection are discarded.
pub fn all<T, I>(promises: I) -> Promise<Vec<T>>
    where T: Clone + Send + Sync + 'static,
          I: IntoIterator<Item = Promise<T>>
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::resolve(Vec::new());
    }

    let core = Arc::new(Core::new());
    let gather = Arc::new(Spinlock::new(Gather::new(promises.len())));

    for (idx, promise) in promises.iter().enumerate() {
        let core = core.clone();
        let gather = gather.clone();

        promise.core().on_settle(Box::new(move |result| match *result {
            Ok(ref val) => {
                let val = val.clone();
                let values = gather.lock().fill(idx, val);
                if let Some(values) = values {
                    core.settle(Ok(values));
                }
            }
            Err(ref err) => {
                core.settle(Err(err.clone()));
            }
        }));
    }

    Promise::from_core(core)
}

/// Fulfil with the `Outcome` of every input in input order
///
/// Never rejects. An empty input fulfils immediately with an empty `Vec`.
pub fn all_settled<T, I>(promises: I) -> Promise<Vec<Outcome<T>>>
    where T: Clone + Send + Sync + 'static,
          I: IntoIterator<Item = Promise<T>>
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::resolve(Vec::new());
    }

    let core = Arc::new(Core::new());
    let gather = Arc::new(Spinlock::new(Gather::new(promises.len())));

    for (idx, promise) in promises.iter().enumerate() {
        let core = core.clone();
        let gather = gather.clone();

        promise.core().on_settle(Box::new(move |result| {
            let outcome = Outcome::from(result.clone());
            let outcomes = gather.lock().fill(idx, outcome);
            if let Some(outcomes) = outcomes {
                core.settle(Ok(outcomes));
            }
        }));
    }

    Promise::from_core(core)
}

/// Settle like the first input to settle
///
/// Rejects with `Error::EmptyInput` if there is nothing to race.
pub fn race<T, I>(promises: I) -> Promise<T>
    where T: Clone + Send + Sync + 'static,
          I: IntoIterator<Item = Promise<T>>
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::reject(Error::EmptyInput("race"));
    }

    let core = Arc::new(Core::new());
    for promise in &promises {
        let core = core.clone();
        promise.core().on_settle(Box::new(move |result| {
            core.settle(result.clone());
        }));
    }

    Promise::from_core(core)
}

/// Fulfil with the first input to succeed
///
/// Rejections only take an input out of the race. Once every input has been
/// rejected, rejects with `Error::AllFailed` carrying their errors in input
/// order. Rejects with `Error::EmptyInput` if there is nothing to race.
pub fn any<T, I>(promises: I) -> Promise<T>
    where T: Clone + Send + Sync + 'static,
          I: IntoIterator<Item = Promise<T>>
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::reject(Error::EmptyInput("any"));
    }

    let core = Arc::new(Core::new());
    // Each input is registered once; its rejection only shrinks the pool
    let rejected = Arc::new(Spinlock::new(Gather::new(promises.len())));

    for (idx, promise) in promises.iter().enumerate() {
        let core = core.clone();
        let rejected = rejected.clone();

        promise.core().on_settle(Box::new(move |result| match *result {
            Ok(ref val) => {
                core.settle(Ok(val.clone()));
            }
            Err(ref err) => {
                let errors = rejected.lock().fill(idx, err.clone());
                match errors {
                    Some(errors) => {
                        trace!("any: all {} inputs rejected", errors.len());
                        core.settle(Err(Error::AllFailed(errors)));
                    }
                    None => trace!("any: input {} rejected", idx),
                }
            }
        }));
    }

    Promise::from_core(core)
}
