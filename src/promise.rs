// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

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
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE

//! Promise style asynchronous APIs
//!
//! A `Promise<T>` is a handle to a value of type `T` that will be available
//! at some point, or to the `Error` that prevented it. Handles are cheap to
//! clone and all clones observe the same settlement.
//!
//! Handlers attached with `on_success`, `on_failure`, `on_settle` and friends
//! run on whichever thread settles the source promise, or right away on the
//! calling thread if it has already settled. Every handler produces a new
//! `Promise`; the receiver is never modified.

use std::fmt;
use std::sync::Arc;

use crate::aggregate;
use crate::error::{catch, Error, Result};
use crate::options::Options;
use crate::scheduler::{Executor, Task, ThreadPerTask};
use crate::sync::future::{self, Core};
use crate::sync::spinlock::Spinlock;
use crate::sync::Resolver;

/// Store the eventual result of a computation, `Ok(T)` if it succeeded, `Err(Error)` otherwise.
pub struct Promise<T>
    where T: Send + Sync + 'static
{
    core: Arc<Core<T>>,
}

impl<T> Promise<T>
    where T: Send + Sync + 'static
{
    /// Create a pending promise and the `Resolver` that settles it
    pub fn pending() -> (Resolver<T>, Promise<T>) {
        let (resolver, core) = future::make();
        (resolver, Promise::from_core(core))
    }

    /// Run the computation on a new thread
    pub fn spawn<F>(f: F) -> Promise<T>
        where F: FnOnce() -> Result<T> + Send + 'static
    {
        Promise::spawn_on(&ThreadPerTask::new(), f)
    }

    /// Run the computation on a new thread configured with `opts`
    pub fn spawn_opts<F>(f: F, opts: Options) -> Promise<T>
        where F: FnOnce() -> Result<T> + Send + 'static
    {
        Promise::spawn_on(&ThreadPerTask::with_options(opts), f)
    }

    /// Submit the computation to `executor`
    ///
    /// The promise is fulfilled with the value `f` returns, or rejected with
    /// its error. A panic inside `f` rejects with `Error::Panicked`. If the
    /// executor refuses the task, the promise is rejected with
    /// `Error::Abandoned`.
    pub fn spawn_on<E, F>(executor: &E, f: F) -> Promise<T>
        where E: Executor + ?Sized,
              F: FnOnce() -> Result<T> + Send + 'static
    {
        let (resolver, promise) = Promise::pending();

        let task: Task = Box::new(move || {
            resolver.settle(catch(f));
        });

        debug!("Submitting computation {:?}", promise);
        if let Err(err) = executor.execute(task) {
            debug!("Executor refused computation: {}", err);
        }

        promise
    }

    /// An already fulfilled promise
    pub fn resolve(val: T) -> Promise<T> {
        Promise::from_core(Arc::new(Core::with_result(Ok(val))))
    }

    /// An already rejected promise
    pub fn reject<E: Into<Error>>(err: E) -> Promise<T> {
        Promise::from_core(Arc::new(Core::with_result(Err(err.into()))))
    }

    /// Resolving a promise with a promise yields that very promise
    #[inline]
    pub fn adopt(promise: Promise<T>) -> Promise<T> {
        promise
    }

    /// Whether both handles refer to the same promise
    #[inline]
    pub fn ptr_eq(this: &Promise<T>, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&this.core, &other.core)
    }

    pub fn is_settled(&self) -> bool {
        self.core.peek().is_some()
    }

    pub(crate) fn from_core(core: Arc<Core<T>>) -> Promise<T> {
        Promise { core: core }
    }

    pub(crate) fn core(&self) -> &Arc<Core<T>> {
        &self.core
    }

    /// Derive a new promise from the settlement of this one
    fn derive<U, F>(&self, f: F) -> Promise<U>
        where U: Send + Sync + 'static,
              F: FnOnce(&Result<T>) -> Result<U> + Send + 'static
    {
        let (resolver, promise) = Promise::pending();
        self.core.on_settle(Box::new(move |result| {
            resolver.settle(catch(|| f(result)));
        }));
        promise
    }
}

impl<T> Promise<T>
    where T: Clone + Send + Sync + 'static
{
    /// Block the current thread until the promise settles and retrieve the result
    pub fn join(&self) -> Result<T> {
        (*self.core.wait()).clone()
    }

    /// The result, if the promise has settled
    pub fn try_get(&self) -> Option<Result<T>> {
        self.core.peek().map(|result| (*result).clone())
    }

    /// Execute the function if the result is `Ok`, otherwise pass the error on
    pub fn on_success<U, F>(&self, f: F) -> Promise<U>
        where U: Send + Sync + 'static,
              F: FnOnce(T) -> Result<U> + Send + 'static
    {
        self.derive(move |result| match *result {
            Ok(ref val) => f(val.clone()),
            Err(ref err) => Err(err.clone()),
        })
    }

    /// Run the side effect if the result is `Ok`
    pub fn on_success_do<F>(&self, f: F) -> Promise<()>
        where F: FnOnce(T) + Send + 'static
    {
        self.on_success(move |val| {
            f(val);
            Ok(())
        })
    }

    /// Execute the function if the result is `Err`, otherwise pass the value on
    ///
    /// The value returned by `f` fulfils the new promise, so a recovered
    /// failure continues down the success path.
    pub fn on_failure<F>(&self, f: F) -> Promise<T>
        where F: FnOnce(Error) -> Result<T> + Send + 'static
    {
        self.derive(move |result| match *result {
            Ok(ref val) => Ok(val.clone()),
            Err(ref err) => f(err.clone()),
        })
    }

    /// Run the side effect if the result is `Err`
    ///
    /// The new promise is fulfilled with `()` either way, unless `f` panics.
    pub fn on_failure_do<F>(&self, f: F) -> Promise<()>
        where F: FnOnce(Error) + Send + 'static
    {
        self.derive(move |result| {
            if let Err(ref err) = *result {
                f(err.clone());
            }
            Ok(())
        })
    }

    /// Run the function with the result of this promise, whatever it is
    pub fn on_settle<U, F>(&self, f: F) -> Promise<U>
        where U: Send + Sync + 'static,
              F: FnOnce(Result<T>) -> Result<U> + Send + 'static
    {
        self.derive(move |result| f(result.clone()))
    }

    pub fn on_settle_do<F>(&self, f: F) -> Promise<()>
        where F: FnOnce(Result<T>) + Send + 'static
    {
        self.on_settle(move |result| {
            f(result);
            Ok(())
        })
    }

    /// Run `f` once this promise settles, ignoring the result
    pub fn finally<F>(&self, f: F) -> Promise<()>
        where F: FnOnce() + Send + 'static
    {
        self.derive(move |_| {
            f();
            Ok(())
        })
    }

    /// Wait for both promises, rejecting as soon as either of them rejects
    pub fn zip<U>(&self, other: &Promise<U>) -> Promise<(T, U)>
        where U: Clone + Send + Sync + 'static
    {
        let core = Arc::new(Core::new());
        let slots = Arc::new(Spinlock::new((None, None)));

        {
            let core = core.clone();
            let slots = slots.clone();
            self.core.on_settle(Box::new(move |result| match *result {
                Ok(ref val) => {
                    let val = val.clone();
                    let pair = {
                        let mut slots = slots.lock();
                        slots.0 = Some(val);
                        take_pair(&mut *slots)
                    };

                    if let Some(pair) = pair {
                        core.settle(Ok(pair));
                    }
                }
                Err(ref err) => {
                    core.settle(Err(err.clone()));
                }
            }));
        }

        {
            let core = core.clone();
            other.core.on_settle(Box::new(move |result| match *result {
                Ok(ref val) => {
                    let val = val.clone();
                    let pair = {
                        let mut slots = slots.lock();
                        slots.1 = Some(val);
                        take_pair(&mut *slots)
                    };

                    if let Some(pair) = pair {
                        core.settle(Ok(pair));
                    }
                }
                Err(ref err) => {
                    core.settle(Err(err.clone()));
                }
            }));
        }

        Promise::from_core(core)
    }

    /// See `aggregate::all`
    pub fn all<I>(promises: I) -> Promise<Vec<T>>
        where I: IntoIterator<Item = Promise<T>>
    {
        aggregate::all(promises)
    }

    /// See `aggregate::all_settled`
    pub fn all_settled<I>(promises: I) -> Promise<Vec<aggregate::Outcome<T>>>
        where I: IntoIterator<Item = Promise<T>>
    {
        aggregate::all_settled(promises)
    }

    /// See `aggregate::race`
    pub fn race<I>(promises: I) -> Promise<T>
        where I: IntoIterator<Item = Promise<T>>
    {
        aggregate::race(promises)
    }

    /// See `aggregate::any`
    pub fn any<I>(promises: I) -> Promise<T>
        where I: IntoIterator<Item = Promise<T>>
    {
        aggregate::any(promises)
    }
}

fn take_pair<A, B>(slots: &mut (Option<A>, Option<B>)) -> Option<(A, B)> {
    match (slots.0.take(), slots.1.take()) {
        (Some(a), Some(b)) => Some((a, b)),
        (a, b) => {
            slots.0 = a;
            slots.1 = b;
            None
        }
    }
}

impl<T> Clone for Promise<T>
    where T: Send + Sync + 'static
{
    fn clone(&self) -> Promise<T> {
        Promise { core: self.core.clone() }
    }
}

impl<T> From<T> for Promise<T>
    where T: Send + Sync + 'static
{
    fn from(val: T) -> Promise<T> {
        Promise::resolve(val)
    }
}

impl<T> fmt::Debug for Promise<T>
    where T: Send + Sync + 'static
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Promise({:?})", self.core)
    }
}
