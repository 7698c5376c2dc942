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

//! Knobs applied when a coroutine is created.

/// Stack size used when the caller does not pick one. Generous enough for
/// ordinary call depths while keeping thousands of coroutines affordable;
/// the stack allocator adds a guard page on top.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Per-coroutine settings, normally assembled through [`crate::Builder`].
#[derive(Debug)]
pub struct Options {
    /// Usable bytes mapped for the coroutine's stack.
    pub stack_size: usize,

    /// Label shown in panic reports and trace logs.
    pub name: Option<String>,
}

impl Options {
    pub fn new() -> Options {
        Options {
            stack_size: DEFAULT_STACK_SIZE,
            name: None,
        }
    }
}

impl Default for Options {
    fn default() -> Options {
        Options::new()
    }
}
