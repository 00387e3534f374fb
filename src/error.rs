// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error carried by a rejected `Promise`

use std::any::Any;
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

/// The single rejection channel of a `Promise`.
///
/// Cloning is cheap, every payload is behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An error raised by a computation or handler, kept verbatim
    #[error("{0}")]
    Failed(Arc<dyn StdError + Send + Sync + 'static>),

    /// An ad-hoc error message
    #[error("{0}")]
    Message(Arc<str>),

    /// A computation or handler panicked
    #[error("panicked: {0}")]
    Panicked(Arc<str>),

    /// Every input of `any` was rejected, errors are in input order
    #[error("all {} promises were rejected", .0.len())]
    AllFailed(Vec<Error>),

    /// `race` or `any` was called without inputs
    #[error("{0} called with an empty collection")]
    EmptyInput(&'static str),

    /// The settling side was dropped before it settled
    #[error("promise was dropped before it settled")]
    Abandoned,
}

impl Error {
    /// Wrap an arbitrary error
    pub fn new<E>(err: E) -> Error
        where E: StdError + Send + Sync + 'static
    {
        Error::Failed(Arc::new(err))
    }

    /// Create an error from a message
    pub fn msg<M: Into<String>>(msg: M) -> Error {
        Error::Message(Arc::from(msg.into()))
    }

    /// Borrow the wrapped error if it is of type `E`
    pub fn downcast_ref<E>(&self) -> Option<&E>
        where E: StdError + 'static
    {
        match *self {
            Error::Failed(ref err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Whether this error was produced by a panic
    pub fn is_panic(&self) -> bool {
        matches!(*self, Error::Panicked(..))
    }

    fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Error {
        let msg: Arc<str> = if let Some(s) = payload.downcast_ref::<&'static str>() {
            Arc::from(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Arc::from(s.as_str())
        } else {
            Arc::from("Box<dyn Any>")
        };

        Error::Panicked(msg)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (&Error::Failed(ref a), &Error::Failed(ref b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (&Error::Message(ref a), &Error::Message(ref b)) => a == b,
            (&Error::Panicked(ref a), &Error::Panicked(ref b)) => a == b,
            (&Error::AllFailed(ref a), &Error::AllFailed(ref b)) => a == b,
            (&Error::EmptyInput(a), &Error::EmptyInput(b)) => a == b,
            (&Error::Abandoned, &Error::Abandoned) => true,
            _ => false,
        }
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Error {
        Error::msg(msg)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Error {
        Error::msg(msg)
    }
}

/// Result type of a settled `Promise`
pub type Result<T> = ::std::result::Result<T, Error>;

/// Run `f`, turning a panic into `Error::Panicked`
pub(crate) fn catch<R, F>(f: F) -> Result<R>
    where F: FnOnce() -> Result<R>
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let err = Error::from_panic(payload);
            warn!("Captured panic in deferred computation: {}", err);
            Err(err)
        }
    }
}
