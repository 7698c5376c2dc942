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

//! Reuse of coroutine stacks.

use std::env;
use std::sync::OnceLock;

use crate::error::Result;
use crate::stack::Stack;

/// Keeps the stacks of ended coroutines around, so a spawn-heavy workload
/// is not one mmap/munmap round trip per coroutine.
#[derive(Debug)]
pub struct StackPool {
    // Unordered; the cache is small enough that a linear scan is fine.
    stacks: Vec<Stack>,
}

impl StackPool {
    pub fn new() -> StackPool {
        StackPool { stacks: Vec::new() }
    }

    /// Hand out a cached stack of at least `min_size` usable bytes, or map
    /// a fresh one when nothing in the cache is big enough.
    pub fn take_stack(&mut self, min_size: usize) -> Result<Stack> {
        match self.stacks.iter().position(|s| s.min_size() >= min_size) {
            Some(idx) => Ok(self.stacks.swap_remove(idx)),
            None => Stack::new(min_size),
        }
    }

    /// Return a stack to the cache; once the cache is full the stack is
    /// simply dropped, which unmaps it.
    pub fn give_stack(&mut self, stack: Stack) {
        if self.stacks.len() < cache_limit() {
            self.stacks.push(stack)
        }
    }
}

impl Default for StackPool {
    fn default() -> StackPool {
        StackPool::new()
    }
}

/// How many stacks to keep per scheduler. Ten default-sized stacks hold on
/// to 2.5M of address space; `STRAND_MAX_CACHED_STACKS` overrides the limit
/// (0 disables caching altogether).
fn cache_limit() -> usize {
    static LIMIT: OnceLock<usize> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        env::var("STRAND_MAX_CACHED_STACKS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(10)
    })
}

#[cfg(test)]
mod tests {
    use super::StackPool;

    #[test]
    fn pool_prefers_a_big_enough_cached_stack() {
        let mut pool = StackPool::new();
        let first = pool.take_stack(64 * 1024).unwrap();
        pool.give_stack(first);

        // A smaller request is still served by the cached 64K stack.
        let reused = pool.take_stack(16 * 1024).unwrap();
        assert_eq!(reused.min_size(), 64 * 1024);
    }

    #[test]
    fn pool_maps_fresh_when_nothing_fits() {
        let mut pool = StackPool::new();
        let small = pool.take_stack(32 * 1024).unwrap();
        pool.give_stack(small);

        // The cached 32K stack cannot serve a 128K request.
        let big = pool.take_stack(128 * 1024).unwrap();
        assert_eq!(big.min_size(), 128 * 1024);
    }

    #[test]
    fn pool_serves_exact_size_matches() {
        let mut pool = StackPool::new();
        let stack = pool.take_stack(48 * 1024).unwrap();
        pool.give_stack(stack);

        let reused = pool.take_stack(48 * 1024).unwrap();
        assert_eq!(reused.min_size(), 48 * 1024);
    }
}
