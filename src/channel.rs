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

//! Unbuffered rendezvous channels.
//!
//! A send and a receive meet, the value (or a boxed error) moves exactly
//! once from the sender's slot to the receiver's, and both sides continue.
//! The slot lives on the blocked party's stack, which is frozen while it is
//! parked, so the transfer needs no allocation. At any quiescent point at
//! most one of the two queues is non-empty: an arriving operation always
//! rendezvouses with the head of the opposite queue before parking itself.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;

use log::trace;

use crate::coroutine::CoroId;
use crate::deadline::Deadline;
use crate::error::{BoxedError, Error, Result};
use crate::scheduler::{ChannelQueues, Scheduler, Wait, Wake};

/// The cell a parked operation exposes to its rendezvous partner.
enum Slot<T> {
    Empty,
    Value(T),
    Failure(BoxedError),
}

struct Queues<T> {
    done: bool,
    /// Parked senders, slots already holding their payload.
    senders: VecDeque<(CoroId, *mut Slot<T>)>,
    /// Parked receivers, slots empty until a sender fills them.
    receivers: VecDeque<(CoroId, *mut Slot<T>)>,
}

struct Inner<T> {
    queues: RefCell<Queues<T>>,
}

impl<T: 'static> ChannelQueues for Inner<T> {
    fn unlink(&self, id: CoroId) {
        let mut q = self.queues.borrow_mut();
        q.senders.retain(|&(waiter, _)| waiter != id);
        q.receivers.retain(|&(waiter, _)| waiter != id);
    }
}

/// A synchronous rendezvous channel carrying values of `T` or transported
/// errors. Clones share the same channel.
///
/// ```
/// let ch = strand::Channel::<u32>::new();
/// let tx = ch.clone();
/// strand::spawn(move || {
///     tx.send(7, strand::Deadline::NEVER).unwrap();
/// }).unwrap();
///
/// assert_eq!(ch.receive(strand::Deadline::NEVER).unwrap(), 7);
/// ```
pub struct Channel<T> {
    inner: Rc<Inner<T>>,
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Channel<T> {
        Channel {
            inner: Rc::new(Inner {
                queues: RefCell::new(Queues {
                    done: false,
                    senders: VecDeque::new(),
                    receivers: VecDeque::new(),
                }),
            }),
        }
    }

    /// Hand `value` to a receiver, parking until one arrives or `deadline`
    /// elapses.
    pub fn send(&self, value: T, deadline: Deadline) -> Result<()> {
        self.transfer(Slot::Value(value), deadline)
    }

    /// Hand an error to a receiver; its `receive` fails with
    /// `Error::Carried` holding this exact value.
    pub fn send_error(&self, err: BoxedError, deadline: Deadline) -> Result<()> {
        self.transfer(Slot::Failure(err), deadline)
    }

    fn transfer(&self, payload: Slot<T>, deadline: Deadline) -> Result<()> {
        let sched = Scheduler::current();
        let mut slot = payload;
        {
            let mut q = self.inner.queues.borrow_mut();
            if q.done {
                return Err(Error::ChannelDone);
            }

            // A parked receiver takes the payload right now; no suspension.
            if let Some((receiver, their_slot)) = q.receivers.pop_front() {
                unsafe {
                    *their_slot = mem::replace(&mut slot, Slot::Empty);
                }
                drop(q);
                trace!("rendezvous: handed payload to coroutine {}", receiver);
                sched.make_ready(receiver, Wake::Transfer);
                return Ok(());
            }

            let me = sched.current_id();
            q.senders.push_back((me, &mut slot as *mut Slot<T>));
        }

        match self.park(sched, deadline) {
            Wake::Transfer => Ok(()),
            Wake::ChannelDone => Err(Error::ChannelDone),
            Wake::Timeout => Err(Error::Timeout),
            Wake::Canceled => Err(Error::Canceled),
            other => unreachable!("parked sender woken with {:?}", other),
        }
    }

    /// Take a value from a sender, parking until one arrives or `deadline`
    /// elapses. An error sent by the peer is re-surfaced as
    /// `Error::Carried`.
    pub fn receive(&self, deadline: Deadline) -> Result<T> {
        let sched = Scheduler::current();
        let mut slot: Slot<T> = Slot::Empty;
        {
            let mut q = self.inner.queues.borrow_mut();
            if q.done {
                return Err(Error::ChannelDone);
            }

            // A parked sender already holds its payload; take it directly.
            if let Some((sender, their_slot)) = q.senders.pop_front() {
                let payload = unsafe { mem::replace(&mut *their_slot, Slot::Empty) };
                drop(q);
                trace!("rendezvous: took payload from coroutine {}", sender);
                sched.make_ready(sender, Wake::Transfer);
                return Slot::unwrap_transfer(payload);
            }

            let me = sched.current_id();
            q.receivers.push_back((me, &mut slot as *mut Slot<T>));
        }

        match self.park(sched, deadline) {
            Wake::Transfer => Slot::unwrap_transfer(mem::replace(&mut slot, Slot::Empty)),
            Wake::ChannelDone => Err(Error::ChannelDone),
            Wake::Timeout => Err(Error::Timeout),
            Wake::Canceled => Err(Error::Canceled),
            other => unreachable!("parked receiver woken with {:?}", other),
        }
    }

    /// Terminate the channel: every parked sender and receiver is released
    /// with `ChannelDone`, as is every later operation. Idempotent.
    pub fn done(&self) {
        let sched = Scheduler::current();
        let drained: Vec<CoroId> = {
            let mut q = self.inner.queues.borrow_mut();
            if q.done {
                return;
            }
            q.done = true;
            let q = &mut *q;
            q.senders
                .drain(..)
                .chain(q.receivers.drain(..))
                .map(|(id, _)| id)
                .collect()
        };

        trace!("channel done; releasing {} parked coroutines", drained.len());
        for id in drained {
            sched.make_ready(id, Wake::ChannelDone);
        }
    }

    pub fn is_done(&self) -> bool {
        self.inner.queues.borrow().done
    }

    fn park(&self, sched: &mut Scheduler, deadline: Deadline) -> Wake {
        if let Some(when) = deadline.instant() {
            sched.arm_timer(when);
        }
        sched.suspend(Wait::Channel {
            queues: self.inner.clone(),
        })
    }
}

impl<T> Slot<T> {
    fn unwrap_transfer(self) -> Result<T> {
        match self {
            Slot::Value(v) => Ok(v),
            Slot::Failure(e) => Err(Error::Carried(e)),
            Slot::Empty => unreachable!("rendezvous completed with an empty slot"),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Channel<T> {
        Channel::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Channel<T> {
        Channel {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.inner.queues.borrow();
        f.debug_struct("Channel")
            .field("done", &q.done)
            .field("parked_senders", &q.senders.len())
            .field("parked_receivers", &q.receivers.len())
            .finish()
    }
}
