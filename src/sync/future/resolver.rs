// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use super::Core;

/// The settling side of a pending `Promise`
///
/// Dropping a `Resolver` that never settled rejects the core with
/// `Error::Abandoned`.
pub struct Resolver<T>
    where T: Send + Sync + 'static
{
    core: Option<Arc<Core<T>>>,
}

impl<T> Resolver<T>
    where T: Send + Sync + 'static
{
    pub fn with_core(core: Arc<Core<T>>) -> Resolver<T> {
        Resolver { core: Some(core) }
    }

    pub fn resolve(self, val: T) -> bool {
        self.settle(Ok(val))
    }

    pub fn reject<E: Into<Error>>(self, err: E) -> bool {
        self.settle(Err(err.into()))
    }

    /// Settle with `result`, returns `false` if the core was already settled
    pub fn settle(mut self, result: Result<T>) -> bool {
        match self.core.take() {
            Some(core) => core.settle(result),
            None => false,
        }
    }
}

impl<T> Drop for Resolver<T>
    where T: Send + Sync + 'static
{
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            if core.settle(Err(Error::Abandoned)) {
                warn!("Resolver dropped without settling its promise");
            }
        }
    }
}

impl<T> fmt::Debug for Resolver<T>
    where T: Send + Sync + 'static
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.core {
            Some(ref core) => write!(f, "Resolver({:?})", core),
            None => write!(f, "Resolver(<spent>)"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::make;
    use crate::error::Error;

    #[test]
    fn test_resolve() {
        let (resolver, core) = make();
        assert!(resolver.resolve(3));
        assert_eq!(*core.wait(), Ok(3));
    }

    #[test]
    fn test_reject() {
        let (resolver, core) = make::<()>();
        assert!(resolver.reject("broken pipe"));
        assert_eq!(*core.wait(), Err(Error::msg("broken pipe")));
    }

    #[test]
    fn test_drop_abandons() {
        let (resolver, core) = make::<u8>();
        drop(resolver);
        assert_eq!(*core.wait(), Err(Error::Abandoned));
    }

    #[test]
    fn test_settle_after_external_settle() {
        let (resolver, core) = make();
        assert!(core.settle(Ok(1)));
        assert!(!resolver.resolve(2));
        assert_eq!(*core.wait(), Ok(1));
    }
}
