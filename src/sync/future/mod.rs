// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! One-shot settlement core shared between a `Resolver` and its `Promise`s

mod cell;
mod resolver;

pub use self::cell::{Continuation, Core};
pub use self::resolver::Resolver;

use std::sync::Arc;

/// Create a pending core together with the only handle allowed to settle it
pub fn make<T>() -> (Resolver<T>, Arc<Core<T>>)
    where T: Send + Sync + 'static
{
    let core = Arc::new(Core::new());
    (Resolver::with_core(core.clone()), core)
}
