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

//! Pending deadlines, ordered soonest-first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::coroutine::CoroId;

/// One armed deadline. Entries with equal deadlines fire in insertion
/// order; `seq` is the monotonic tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerEntry {
    pub when: Instant,
    pub seq: u64,
    pub owner: CoroId,
}

/// Min-heap of armed deadlines.
///
/// Cancellation is lazy: the scheduler records the `seq` of a coroutine's
/// live entry, and an entry whose `seq` no longer matches is dead weight
/// that gets dropped the next time it surfaces at the head.
#[derive(Debug)]
pub struct TimerHeap {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_seq: u64,
}

impl TimerHeap {
    pub fn new() -> TimerHeap {
        TimerHeap {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Arm a deadline for `owner`; returns the entry's tie-break token.
    pub fn insert(&mut self, when: Instant, owner: CoroId) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(TimerEntry { when, seq, owner }));
        seq
    }

    /// Pop every live entry with `when <= now`, in (deadline, insertion)
    /// order. Stale entries encountered on the way are discarded.
    pub fn pop_expired<F>(&mut self, now: Instant, live: F) -> Vec<TimerEntry>
    where
        F: Fn(&TimerEntry) -> bool,
    {
        let mut expired = Vec::new();
        while let Some(Reverse(head)) = self.heap.peek() {
            if !live(head) {
                self.heap.pop();
                continue;
            }
            if head.when > now {
                break;
            }
            expired.push(self.heap.pop().unwrap().0);
        }
        expired
    }

    /// The earliest live deadline, purging stale heads on the way.
    pub fn next_deadline<F>(&mut self, live: F) -> Option<Instant>
    where
        F: Fn(&TimerEntry) -> bool,
    {
        while let Some(Reverse(head)) = self.heap.peek() {
            if live(head) {
                return Some(head.when);
            }
            self.heap.pop();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

impl Default for TimerHeap {
    fn default() -> TimerHeap {
        TimerHeap::new()
    }
}
