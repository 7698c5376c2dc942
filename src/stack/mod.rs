// The MIT License (MIT)

// Copyright (c) 2026 Strand Developers

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

//! Coroutine stacks: mmap'd regions with a guard page at the low end.

use std::fmt;
use std::ptr;

use crate::error::{Error, Result};

pub use self::stack_pool::StackPool;

pub mod stack_pool;

const MIN_STACK_SIZE: usize = 16 * 1024;

// Try to use MAP_STACK on platforms that support it (it's what we're doing
// anyway); the BSDs historically mishandle it.
#[cfg(any(target_os = "linux", target_os = "android"))]
const STACK_FLAGS: libc::c_int = libc::MAP_STACK | libc::MAP_PRIVATE | libc::MAP_ANON;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const STACK_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

/// A coroutine's stack. Grows from `end()` (high) towards `start()` (low);
/// the lowest page is `PROT_NONE`, so running off the end faults instead of
/// scribbling over neighbouring memory.
pub struct Stack {
    base: *mut libc::c_void,
    len: usize,
    min_size: usize,
}

impl Stack {
    /// Map a new stack of at least `size` usable bytes plus a guard page.
    pub fn new(size: usize) -> Result<Stack> {
        let page = page_size();
        let size = size.max(MIN_STACK_SIZE);
        let len = round_up(size, page) + page; // one page of guard

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                STACK_FLAGS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(Error::OutOfMemory);
        }

        // The start of the segment is the guard: stacks grow from higher
        // addresses to lower ones.
        let rc = unsafe { libc::mprotect(base, page, libc::PROT_NONE) };
        if rc != 0 {
            unsafe {
                libc::munmap(base, len);
            }
            return Err(Error::OutOfMemory);
        }

        Ok(Stack {
            base,
            len,
            min_size: size,
        })
    }

    /// Low end of the mapping (the guard page).
    pub fn start(&self) -> *const u8 {
        self.base as *const u8
    }

    /// One byte past the high end of the mapping; initial stack pointers are
    /// derived from here.
    pub fn end(&self) -> *const u8 {
        unsafe { (self.base as *const u8).add(self.len) }
    }

    /// The usable size this stack was requested with.
    #[inline]
    pub fn min_size(&self) -> usize {
        self.min_size
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base, self.len);
        }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("min_size", &self.min_size)
            .finish()
    }
}

pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

fn round_up(n: usize, to: usize) -> usize {
    (n + to - 1) & !(to - 1)
}
