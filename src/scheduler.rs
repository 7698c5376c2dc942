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

//! The per-thread scheduler: one ready queue, one timer heap, one reactor.
//!
//! The thread's native stack is registered as the root coroutine (id 0), so
//! plain main-thread code can block on channels, timers and descriptors
//! exactly like a spawned coroutine. There is no dedicated scheduler stack:
//! when a coroutine suspends, the dispatch loop runs briefly on the
//! suspending stack, picks the next runnable coroutine and switches to it.

use std::cell::UnsafeCell;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Instant;

use log::{debug, trace};

use crate::context::Context;
use crate::coroutine::{coroutine_entry, CoroId, Coroutine, Handle, Shared, State};
use crate::error::{Error, Result};
use crate::fd::Direction;
use crate::options::Options;
use crate::reactor::Reactor;
use crate::stack::StackPool;
use crate::timer::{TimerEntry, TimerHeap};

const ROOT_ID: CoroId = 0;

/// What a suspended coroutine is parked on. Cancellation and timer expiry
/// use this to unlink the coroutine from the structure that references it.
pub(crate) enum Wait {
    None,

    /// Sleeping until an armed deadline.
    Timer,

    /// Parked in a channel's sender or receiver queue. The trait object
    /// keeps the channel alive and knows how to unlink by id.
    Channel { queues: Rc<dyn ChannelQueues> },

    /// Parked in the reactor's waiter table.
    Io { fd: RawFd, dir: Direction },
}

/// Why a coroutine was moved back to the ready queue. Blocking operations
/// translate this into their result on resume.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Wake {
    /// Ordinary dispatch: fresh spawn or voluntary yield.
    Scheduled,

    /// The sleep deadline arrived.
    Timer,

    /// The operation's deadline elapsed before it could complete.
    Timeout,

    /// A channel rendezvous completed; the slot holds the outcome.
    Transfer,

    /// The channel was marked done while parked on it.
    ChannelDone,

    /// The descriptor became ready.
    Io,

    /// cancel() unparked the coroutine.
    Canceled,
}

/// Implemented by channels so the scheduler can unlink a parked coroutine
/// without knowing the value type.
pub(crate) trait ChannelQueues {
    fn unlink(&self, id: CoroId);
}

thread_local!(static SCHEDULER: UnsafeCell<Option<Box<Scheduler>>> = UnsafeCell::new(None));

pub(crate) struct Scheduler {
    coroutines: HashMap<CoroId, Box<Coroutine>>,
    ready: VecDeque<CoroId>,
    timers: TimerHeap,
    reactor: Reactor,
    stack_pool: StackPool,

    /// Whoever is executing right now; ROOT_ID for the native stack.
    current: CoroId,
    next_id: CoroId,

    /// A finished coroutine whose stack the next context to run gives back
    /// to the pool; one cannot free the stack one is standing on.
    zombie: Option<Box<Coroutine>>,

    /// Register dump for contexts that are never resumed.
    graveyard: Context,
}

impl Scheduler {
    fn new() -> Scheduler {
        let root_shared = Rc::new(Shared::new(ROOT_ID));
        root_shared.state.set(State::Running);
        let root = Box::new(Coroutine {
            shared: root_shared,
            ctx: Context::empty(),
            stack: None,
            body: None,
            wait: Wait::None,
            wake: Wake::Scheduled,
            timer_seq: None,
            name: Some("<root>".to_string()),
        });

        let mut coroutines = HashMap::new();
        coroutines.insert(ROOT_ID, root);

        Scheduler {
            coroutines,
            ready: VecDeque::new(),
            timers: TimerHeap::new(),
            reactor: Reactor::new(),
            stack_pool: StackPool::new(),
            current: ROOT_ID,
            next_id: ROOT_ID + 1,
            zombie: None,
            graveyard: Context::empty(),
        }
    }

    /// The scheduler bound to this thread, created on first use.
    pub(crate) fn current() -> &'static mut Scheduler {
        SCHEDULER.with(|cell| unsafe {
            let slot = &mut *cell.get();
            if slot.is_none() {
                *slot = Some(Box::new(Scheduler::new()));
            }
            let ptr: *mut Scheduler = &mut **slot.as_mut().unwrap();
            &mut *ptr
        })
    }

    pub(crate) fn current_id(&self) -> CoroId {
        self.current
    }

    pub(crate) fn current_cancel_requested(&self) -> bool {
        self.coroutines[&self.current].shared.cancel.get()
    }

    /// Create a coroutine in state `Ready` and enqueue it; the caller keeps
    /// running until its own next suspension point.
    pub(crate) fn spawn_opts<F>(&mut self, f: F, opts: Options) -> Result<Handle>
    where
        F: FnOnce() + 'static,
    {
        if self.current_cancel_requested() {
            return Err(Error::Canceled);
        }

        let stack = self.stack_pool.take_stack(opts.stack_size)?;
        let id = self.next_id;
        self.next_id += 1;

        let shared = Rc::new(Shared::new(id));
        let mut coro = Box::new(Coroutine {
            shared: shared.clone(),
            ctx: Context::empty(),
            stack: Some(stack),
            body: Some(Box::new(f)),
            wait: Wait::None,
            wake: Wake::Scheduled,
            timer_seq: None,
            name: opts.name,
        });
        let arg = &mut *coro as *mut Coroutine as usize;
        coro.ctx = Context::new(coroutine_entry, arg, coro.stack.as_ref().unwrap());

        trace!("spawned coroutine {} '{}'", id, coro.name());
        self.coroutines.insert(id, coro);
        self.ready.push_back(id);
        Ok(Handle::new(shared))
    }

    /// Move to the tail of the ready queue and run everybody else first.
    pub(crate) fn yield_now(&mut self) -> Result<()> {
        let id = self.current;
        {
            let coro = self.coroutines.get_mut(&id).unwrap();
            coro.shared.state.set(State::Ready);
            coro.wake = Wake::Scheduled;
        }
        self.ready.push_back(id);
        self.dispatch(id);

        if self.current_cancel_requested() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }

    /// Sleep until `when`. Even an already-elapsed deadline goes through
    /// one full scheduling round trip. `None` sleeps until cancelled.
    pub(crate) fn sleep_until(&mut self, when: Option<Instant>) -> Result<()> {
        if let Some(when) = when {
            self.arm_timer(when);
        }
        let wake = self.suspend(Wait::Timer);

        if self.current_cancel_requested() {
            return Err(Error::Canceled);
        }
        match wake {
            Wake::Timer => Ok(()),
            Wake::Canceled => Err(Error::Canceled),
            other => unreachable!("sleeper woken with {:?}", other),
        }
    }

    /// Arm a timer entry for the current coroutine.
    pub(crate) fn arm_timer(&mut self, when: Instant) {
        let id = self.current;
        let seq = self.timers.insert(when, id);
        self.coroutines.get_mut(&id).unwrap().timer_seq = Some(seq);
    }

    /// Register the current coroutine as the waiter for `(fd, dir)`.
    pub(crate) fn add_io_waiter(&mut self, fd: RawFd, dir: Direction) -> Result<()> {
        let id = self.current;
        self.reactor.add_waiter(fd, dir, id)
    }

    /// Forget all reactor bookkeeping for `fd`; parked waiters are released
    /// with `Canceled` since their wait was torn down from outside.
    pub(crate) fn clean_fd(&mut self, fd: RawFd) {
        for id in self.reactor.clean(fd) {
            debug!("fd {} cleaned from under coroutine {}", fd, id);
            self.make_ready(id, Wake::Canceled);
        }
    }

    /// Park the current coroutine on `wait` and dispatch others until it is
    /// woken; returns the wake reason.
    pub(crate) fn suspend(&mut self, wait: Wait) -> Wake {
        let id = self.current;
        {
            let coro = self.coroutines.get_mut(&id).unwrap();
            coro.wait = wait;
            coro.shared.state.set(State::Suspended);
        }
        self.dispatch(id);
        self.coroutines[&id].wake
    }

    /// Clear any wait bookkeeping for `id` and enqueue it at the tail.
    ///
    /// Only a suspended coroutine can be woken; a second wake in the same
    /// tick (a descriptor turning ready just as its deadline expires, say)
    /// finds the target already `Ready` and is dropped here.
    pub(crate) fn make_ready(&mut self, id: CoroId, wake: Wake) {
        let Some(coro) = self.coroutines.get_mut(&id) else {
            return;
        };
        if coro.shared.state.get() != State::Suspended {
            trace!("dropping wake {:?} for non-suspended coroutine {}", wake, id);
            return;
        }
        coro.wait = Wait::None;
        coro.timer_seq = None; // lazily drops any armed timer entry
        coro.wake = wake;
        coro.shared.state.set(State::Ready);
        self.ready.push_back(id);
    }

    /// The unpark half of cancellation; the flag itself is set through the
    /// handle's shared cell. Suspended targets are unlinked from whatever
    /// they wait on and woken with `Canceled`; ready or running targets
    /// notice the flag at their next suspension point.
    pub(crate) fn unpark_cancelled(&mut self, id: CoroId) {
        let wait = {
            let Some(coro) = self.coroutines.get_mut(&id) else {
                return;
            };
            coro.shared.cancel.set(true);
            if coro.shared.state.get() != State::Suspended {
                return;
            }
            mem::replace(&mut coro.wait, Wait::None)
        };

        match wait {
            Wait::Channel { queues } => queues.unlink(id),
            Wait::Io { fd, dir } => self.reactor.remove_waiter(fd, dir),
            Wait::Timer | Wait::None => {}
        }
        debug!("cancel unparked coroutine {}", id);
        self.make_ready(id, Wake::Canceled);
    }

    /// Terminal transition of the running coroutine; never returns. The
    /// record is moved aside so the next context reclaims the stack.
    pub(crate) fn finish_current(&mut self) -> ! {
        let id = self.current;
        let mut coro = self
            .coroutines
            .remove(&id)
            .expect("finishing an unknown coroutine");

        let terminal = if coro.shared.cancel.get() {
            State::Cancelled
        } else {
            State::Finished
        };
        coro.shared.state.set(terminal);
        coro.timer_seq = None;
        trace!("coroutine {} '{}' ended: {:?}", id, coro.name(), terminal);

        debug_assert!(self.zombie.is_none());
        self.zombie = Some(coro);

        loop {
            if let Some(next) = self.ready.pop_front() {
                self.current = next;
                let to = self.coroutines.get_mut(&next).unwrap();
                to.shared.state.set(State::Running);
                let to_ctx: *const Context = &to.ctx;
                let scratch: *mut Context = &mut self.graveyard;
                unsafe {
                    Context::swap(&mut *scratch, &*to_ctx);
                }
                unreachable!("resumed a finished coroutine");
            }
            self.poll_events();
        }
    }

    /// Give a finished coroutine's stack back to the pool. Called by every
    /// context right after a switch lands on it.
    pub(crate) fn reap_zombie(&mut self) {
        if let Some(mut zombie) = self.zombie.take() {
            if let Some(stack) = zombie.stack.take() {
                self.stack_pool.give_stack(stack);
            }
        }
    }

    /// Run other coroutines until `from` is runnable again. Runs on `from`'s
    /// stack; returns once a switch back lands here (or immediately when
    /// `from` is the head of the ready queue itself).
    fn dispatch(&mut self, from: CoroId) {
        loop {
            if let Some(next) = self.ready.pop_front() {
                if next == from {
                    self.current = from;
                    let coro = self.coroutines.get_mut(&from).unwrap();
                    coro.shared.state.set(State::Running);
                    return;
                }

                self.current = next;
                let from_ctx: *mut Context = &mut self.coroutines.get_mut(&from).unwrap().ctx;
                let to = self.coroutines.get_mut(&next).unwrap();
                to.shared.state.set(State::Running);
                let to_ctx: *const Context = &to.ctx;
                unsafe {
                    Context::swap(&mut *from_ctx, &*to_ctx);
                }
                // Somebody switched back into `from`.
                self.reap_zombie();
                return;
            }

            self.poll_events();
        }
    }

    /// One blocking step of the run loop: wait for the next timer or
    /// readiness event and enqueue the woken coroutines, timers first.
    fn poll_events(&mut self) {
        let now = Instant::now();
        let timeout = {
            let coroutines = &self.coroutines;
            self.timers
                .next_deadline(|e| timer_entry_live(coroutines, e))
                .map(|when| when.saturating_duration_since(now))
        };

        if timeout.is_none() && !self.reactor.has_waiters() {
            panic!(
                "deadlock: every coroutine is blocked and no timer or \
                 descriptor can wake one ({} suspended)",
                self.coroutines.len()
            );
        }

        let mut io_woken = Vec::new();
        self.reactor.wait(timeout, &mut io_woken);

        let now = Instant::now();
        let expired = {
            let coroutines = &self.coroutines;
            self.timers
                .pop_expired(now, |e| timer_entry_live(coroutines, e))
        };
        for entry in expired {
            self.fire_timer(entry);
        }
        for id in io_woken {
            self.make_ready(id, Wake::Io);
        }
    }

    /// An armed deadline came due: unlink its owner from whatever else it
    /// waits on, then wake it. Sleepers resume normally; everything else
    /// gets `Timeout`.
    fn fire_timer(&mut self, entry: TimerEntry) {
        let id = entry.owner;
        let wait = {
            let Some(coro) = self.coroutines.get_mut(&id) else {
                return;
            };
            mem::replace(&mut coro.wait, Wait::None)
        };

        match wait {
            Wait::Timer => {
                trace!("timer fired for sleeping coroutine {}", id);
                self.make_ready(id, Wake::Timer);
            }
            Wait::Channel { queues } => {
                queues.unlink(id);
                trace!("channel wait for coroutine {} timed out", id);
                self.make_ready(id, Wake::Timeout);
            }
            Wait::Io { fd, dir } => {
                self.reactor.remove_waiter(fd, dir);
                trace!("poll of fd {} by coroutine {} timed out", fd, id);
                self.make_ready(id, Wake::Timeout);
            }
            Wait::None => {}
        }
    }
}

fn timer_entry_live(coroutines: &HashMap<CoroId, Box<Coroutine>>, entry: &TimerEntry) -> bool {
    coroutines
        .get(&entry.owner)
        .is_some_and(|c| c.timer_seq == Some(entry.seq))
}
