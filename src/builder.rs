// The MIT License (MIT)

// Copyright (c) 2026 Strand Developers

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

use crate::coroutine::Handle;
use crate::error::Result;
use crate::options::Options;
use crate::scheduler::Scheduler;

/// Fluent configuration for spawning a coroutine.
///
/// A plain [`crate::spawn`] covers the common case; reach for the builder
/// when a coroutine should carry a label in panic reports or needs a
/// non-default stack size.
///
/// ```
/// let handle = strand::Builder::new()
///     .name("worker".to_string())
///     .stack_size(64 * 1024)
///     .spawn(|| println!("Hello world!!"))
///     .unwrap();
///
/// while !handle.is_done() {
///     strand::yield_now().unwrap();
/// }
/// ```
pub struct Builder {
    opts: Options,
}

impl Builder {
    /// Start from the default options.
    pub fn new() -> Builder {
        Builder {
            opts: Options::new(),
        }
    }

    /// Label the coroutine. The name turns up in panic reports and trace
    /// logs; the runtime attaches no other meaning to it.
    pub fn name(mut self, name: String) -> Builder {
        self.opts.name = Some(name);
        self
    }

    /// Map `size` usable bytes of stack instead of the default.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.opts.stack_size = size;
        self
    }

    /// Spawn a coroutine with the accumulated options on this thread's
    /// scheduler. The coroutine is enqueued ready; the caller keeps running.
    ///
    /// Fails with `Error::Canceled` when called from a coroutine that has
    /// already been cancelled, and with `Error::OutOfMemory` when no stack
    /// could be mapped.
    pub fn spawn<F>(self, f: F) -> Result<Handle>
    where
        F: FnOnce() + 'static,
    {
        Scheduler::current().spawn_opts(f, self.opts)
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}
