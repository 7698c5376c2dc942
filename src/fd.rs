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

//! Suspending on file descriptor readiness.

use std::fmt;
use std::os::unix::io::RawFd;

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::scheduler::{Scheduler, Wait, Wake};

/// Which readiness a poll waits for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// A host file descriptor with a polling contract.
///
/// The runtime never owns the descriptor: it is not closed on drop, and its
/// lifetime is the caller's responsibility. For any `(fd, direction)` pair
/// at most one coroutine may wait at a time; a second waiter fails
/// immediately with `Error::FdBlocked`.
pub struct FileDesc {
    fd: RawFd,
}

impl FileDesc {
    pub fn new(fd: RawFd) -> FileDesc {
        FileDesc { fd }
    }

    pub fn raw(&self) -> RawFd {
        self.fd
    }

    /// Suspend the current coroutine until the descriptor is ready in
    /// `dir`, the deadline elapses (`Error::Timeout`), or the coroutine is
    /// cancelled (`Error::Canceled`).
    pub fn poll(&self, dir: Direction, deadline: Deadline) -> Result<()> {
        if self.fd < 0 {
            return Err(Error::InvalidFd);
        }

        let sched = Scheduler::current();
        sched.add_io_waiter(self.fd, dir)?;
        if let Some(when) = deadline.instant() {
            sched.arm_timer(when);
        }

        let wake = sched.suspend(Wait::Io { fd: self.fd, dir });

        // Cancellation outranks readiness: nothing is lost by failing here,
        // the descriptor stays ready for whoever polls it next.
        if sched.current_cancel_requested() {
            return Err(Error::Canceled);
        }
        match wake {
            Wake::Io => Ok(()),
            Wake::Timeout => Err(Error::Timeout),
            Wake::Canceled => Err(Error::Canceled),
            other => unreachable!("poller woken with {:?}", other),
        }
    }

    /// Drop all runtime bookkeeping for this descriptor without closing it;
    /// used before handing the descriptor to another subsystem. Any
    /// coroutine still parked on it is released with `Error::Canceled`.
    pub fn clean(&self) {
        if self.fd < 0 {
            return;
        }
        Scheduler::current().clean_fd(self.fd);
    }
}

impl fmt::Debug for FileDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileDesc").field(&self.fd).finish()
    }
}
