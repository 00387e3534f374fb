// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

//  Permission is hereby granted, free of charge, to any person obtaining a
//  copy of this software and associated documentation files (the "Software"),
//  to deal in the Software without restriction, including without limitation
//  the rights to use, copy, modify, merge, publish, distribute, sublicense,
//  and/or sell copies of the Software, and to permit persons to whom the
//  Software is furnished to do so, subject to the following conditions:
//
//  The above copyright notice and this permission notice shall be included in
//  all copies or substantial portions of the Software.
//
//  THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
//  OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//  FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//  AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//  LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
//  FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
//  DEALINGS IN THE SOFTWARE.

//! Deferred values with chaining and aggregate combinators
//!
//! ```
//! use deferred::{Error, Promise};
//!
//! let total = Promise::spawn(|| Ok(20))
//!     .on_success(|v| Ok(v + 1))
//!     .on_success(|v| if v > 0 { Ok(v * 2) } else { Err(Error::msg("negative")) });
//!
//! assert_eq!(total.join(), Ok(42));
//!
//! let first = deferred::any(vec![Promise::reject("down"), Promise::resolve(7)]);
//! assert_eq!(first.join(), Ok(7));
//! ```
//!
//! Computations run on an `Executor`: `Promise::spawn` starts one thread per
//! computation, `Promise::spawn_on` accepts any executor such as a
//! `Scheduler` pool. Handlers run on the thread that settles their source, so
//! a handler must not block on a promise that needs the same single worker.

#[macro_use]
extern crate log;

pub use crate::aggregate::{all, all_settled, any, race, Outcome};
pub use crate::error::{Error, Result};
pub use crate::options::Options;
pub use crate::promise::Promise;
pub use crate::scheduler::{Executor, Scheduler, Task, ThreadPerTask};
pub use crate::sync::Resolver;

pub mod aggregate;
pub mod error;
pub mod options;
pub mod promise;
pub mod scheduler;
pub mod sync;

/// Run a computation on a new thread
#[inline(always)]
pub fn spawn<F, T>(f: F) -> Promise<T>
    where F: FnOnce() -> Result<T> + Send + 'static,
          T: Send + Sync + 'static
{
    Promise::spawn(f)
}

/// Run a computation on a new thread with options
#[inline(always)]
pub fn spawn_opts<F, T>(f: F, opts: Options) -> Promise<T>
    where F: FnOnce() -> Result<T> + Send + 'static,
          T: Send + Sync + 'static
{
    Promise::spawn_opts(f, opts)
}

/// An already fulfilled promise
#[inline]
pub fn resolve<T>(val: T) -> Promise<T>
    where T: Send + Sync + 'static
{
    Promise::resolve(val)
}

/// An already rejected promise
#[inline]
pub fn reject<T, E>(err: E) -> Promise<T>
    where T: Send + Sync + 'static,
          E: Into<Error>
{
    Promise::reject(err)
}

/// Computation configuration. Provides detailed control over the thread a computation runs on.
pub struct Builder {
    opts: Options,
}

impl Builder {
    /// Generates the base configuration for spawning a computation, from which configuration methods can be chained.
    pub fn new() -> Builder {
        Builder { opts: Options::new() }
    }

    /// Sets the size of the stack for the new thread.
    #[inline]
    pub fn stack_size(mut self, stack_size: usize) -> Builder {
        self.opts.stack_size = stack_size;
        self
    }

    /// Names the thread-to-be. The name shows up in panic messages and logs.
    #[inline]
    pub fn name(mut self, name: String) -> Builder {
        self.opts.name = Some(name);
        self
    }

    /// Spawn the computation
    #[inline]
    pub fn spawn<F, T>(self, f: F) -> Promise<T>
        where F: FnOnce() -> Result<T> + Send + 'static,
              T: Send + Sync + 'static
    {
        Promise::spawn_opts(f, self.opts)
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}
