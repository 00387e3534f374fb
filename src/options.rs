// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Thread options for spawned computations

use std::default::Default;
use std::thread;

/// Options for the thread running a computation
#[derive(Debug, Clone)]
pub struct Options {
    pub stack_size: usize,
    pub name: Option<String>,
}

/// Default thread stack size, 2MB
pub const DEFAULT_STACK: usize = 2 * 1024 * 1024;

impl Options {
    pub fn new() -> Options {
        Options {
            stack_size: DEFAULT_STACK,
            name: None,
        }
    }

    pub fn stack_size(&mut self, size: usize) -> &mut Options {
        self.stack_size = size;
        self
    }

    pub fn name(&mut self, name: String) -> &mut Options {
        self.name = Some(name);
        self
    }

    pub(crate) fn thread_builder(&self) -> thread::Builder {
        let builder = thread::Builder::new().stack_size(self.stack_size);
        match self.name {
            Some(ref name) => builder.name(name.clone()),
            None => builder,
        }
    }
}

impl Default for Options {
    fn default() -> Options {
        Options::new()
    }
}
