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

//! Readiness multiplexing: epoll on Linux, kqueue on the BSDs and macOS,
//! both through `mio::Poll`.
//!
//! Each registered descriptor owns one slab slot (its token) with room for
//! one reader and one writer. A waiter is removed the moment it is woken,
//! and the registration follows: interest shrinks to whatever direction is
//! still waited on, or disappears entirely.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use log::{trace, warn};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;

use crate::coroutine::CoroId;
use crate::error::{Error, Result};
use crate::fd::Direction;

struct FdEntry {
    fd: RawFd,
    reader: Option<CoroId>,
    writer: Option<CoroId>,
}

impl FdEntry {
    fn interest(&self) -> Option<Interest> {
        match (self.reader.is_some(), self.writer.is_some()) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

pub struct Reactor {
    poll: Poll,
    events: Events,
    entries: Slab<FdEntry>,
    by_fd: HashMap<RawFd, usize>,
}

impl Reactor {
    pub fn new() -> Reactor {
        Reactor {
            poll: Poll::new().expect("failed to create the readiness poller"),
            events: Events::with_capacity(256),
            entries: Slab::new(),
            by_fd: HashMap::new(),
        }
    }

    /// Record `who` as the sole waiter for `(fd, dir)` and register the
    /// descriptor with the host poller.
    ///
    /// Fails with `FdBlocked` if the slot is already taken and `InvalidFd`
    /// if the host refuses the descriptor.
    pub fn add_waiter(&mut self, fd: RawFd, dir: Direction, who: CoroId) -> Result<()> {
        match self.by_fd.get(&fd).copied() {
            Some(key) => {
                let entry = &mut self.entries[key];
                let slot = match dir {
                    Direction::Read => &mut entry.reader,
                    Direction::Write => &mut entry.writer,
                };
                if slot.is_some() {
                    return Err(Error::FdBlocked);
                }
                *slot = Some(who);

                let interest = entry.interest().unwrap();
                if let Err(e) =
                    self.poll
                        .registry()
                        .reregister(&mut SourceFd(&fd), Token(key), interest)
                {
                    trace!("reregister of fd {} failed: {}", fd, e);
                    let entry = &mut self.entries[key];
                    match dir {
                        Direction::Read => entry.reader = None,
                        Direction::Write => entry.writer = None,
                    }
                    return Err(Error::InvalidFd);
                }
                Ok(())
            }
            None => {
                let interest = match dir {
                    Direction::Read => Interest::READABLE,
                    Direction::Write => Interest::WRITABLE,
                };
                let key = self.entries.insert(FdEntry {
                    fd,
                    reader: match dir {
                        Direction::Read => Some(who),
                        Direction::Write => None,
                    },
                    writer: match dir {
                        Direction::Write => Some(who),
                        Direction::Read => None,
                    },
                });
                if let Err(e) =
                    self.poll
                        .registry()
                        .register(&mut SourceFd(&fd), Token(key), interest)
                {
                    trace!("register of fd {} failed: {}", fd, e);
                    self.entries.remove(key);
                    return Err(Error::InvalidFd);
                }
                self.by_fd.insert(fd, key);
                Ok(())
            }
        }
    }

    /// Drop the waiter for `(fd, dir)`, shrinking or removing the
    /// registration. No-op if nobody waits there.
    pub fn remove_waiter(&mut self, fd: RawFd, dir: Direction) {
        let Some(&key) = self.by_fd.get(&fd) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(key) {
            match dir {
                Direction::Read => entry.reader = None,
                Direction::Write => entry.writer = None,
            }
        }
        self.fixup(key);
    }

    /// Forget everything about `fd` without closing it. Returns the
    /// coroutines that were still parked on it.
    pub fn clean(&mut self, fd: RawFd) -> Vec<CoroId> {
        let Some(key) = self.by_fd.remove(&fd) else {
            return Vec::new();
        };
        let entry = self.entries.remove(key);
        if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            trace!("deregister of fd {} failed: {}", fd, e);
        }
        entry.reader.into_iter().chain(entry.writer).collect()
    }

    /// Block until readiness or `timeout`, then append the woken waiters to
    /// `woken` in event order. Spurious returns (EINTR, early timeout) leave
    /// `woken` untouched.
    pub fn wait(&mut self, timeout: Option<Duration>, woken: &mut Vec<CoroId>) {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return,
            Err(e) => panic!("readiness poll failed: {}", e),
        }

        let mut touched = Vec::new();
        for event in self.events.iter() {
            let key = event.token().0;
            let Some(entry) = self.entries.get_mut(key) else {
                warn!("readiness event for unknown token {:?}", event.token());
                continue;
            };

            // Errors and hangups wake both directions so the caller's next
            // syscall can surface what happened.
            let broken = event.is_error();
            if event.is_readable() || event.is_read_closed() || broken {
                if let Some(id) = entry.reader.take() {
                    woken.push(id);
                }
            }
            if event.is_writable() || event.is_write_closed() || broken {
                if let Some(id) = entry.writer.take() {
                    woken.push(id);
                }
            }
            touched.push(key);
        }

        for key in touched {
            self.fixup(key);
        }
    }

    /// Whether any coroutine is parked on a descriptor.
    pub fn has_waiters(&self) -> bool {
        !self.entries.is_empty()
    }

    fn fixup(&mut self, key: usize) {
        let Some(entry) = self.entries.get(key) else {
            return;
        };
        let fd = entry.fd;
        match entry.interest() {
            Some(interest) => {
                if let Err(e) =
                    self.poll
                        .registry()
                        .reregister(&mut SourceFd(&fd), Token(key), interest)
                {
                    warn!("reregister of fd {} failed: {}", fd, e);
                }
            }
            None => {
                if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
                    trace!("deregister of fd {} failed: {}", fd, e);
                }
                self.entries.remove(key);
                self.by_fd.remove(&fd);
            }
        }
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("registered_fds", &self.entries.len())
            .finish()
    }
}
